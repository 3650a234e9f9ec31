use crate::belief::{BeliefState, BeliefTracker};
use crate::catalog::{CatalogStats, EntityLearningStats, KnowledgeBase};
use crate::implication::{ImplicationEngine, KnownAnswers};
use crate::learner::{Distinguisher, WeightLearner};
use crate::model::MAYBE_VALUE;
use crate::selector::{GuessReason, QuestionSelector, Tier, TierPlan, guess_reason};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{Level, debug, event, info, warn};

use super::{Answerer, GameConfig};

/// Entities reported in turn results and state snapshots.
const TOP_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    NotStarted,
    AskingQuestions,
    MakingGuess,
    LearningNew,
    GameOver,
}

impl GameState {
    pub const fn as_str(self) -> &'static str {
        match self {
            GameState::NotStarted => "not_started",
            GameState::AskingQuestions => "asking_questions",
            GameState::MakingGuess => "making_guess",
            GameState::LearningNew => "learning_new",
            GameState::GameOver => "game_over",
        }
    }
}

/// The next question to put to the player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    pub attribute: String,
    pub text: String,
    /// 1-based number this question will have once answered.
    pub number: usize,
    pub tier: Tier,
    /// Expected information gain in bits at selection time.
    pub info_gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnResult {
    pub question_number: usize,
    pub attribute: String,
    pub question_text: String,
    pub answer: f64,
    pub entropy_before: f64,
    pub entropy_after: f64,
    pub confidence: f64,
    pub top_entities: Vec<(String, f64)>,
}

impl TurnResult {
    pub fn entropy_reduction(&self) -> f64 {
        self.entropy_before - self.entropy_after
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Guess {
    pub entity_id: String,
    pub name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntity {
    pub id: String,
    pub name: String,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentState {
    pub state: GameState,
    pub question_number: usize,
    pub entropy: f64,
    pub confidence: f64,
    pub top_entities: Vec<RankedEntity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnSummary {
    pub question: String,
    pub entropy_reduction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameSummary {
    pub questions_asked: usize,
    pub guessed_entity: Option<String>,
    pub final_confidence: f64,
    pub final_entropy: f64,
    pub turns: Vec<TurnSummary>,
}

/// One player's game against the catalog.
///
/// Nothing here returns an error: lookups of unknown ids are no-ops, and a
/// failed save is logged while in-memory state carries on.
pub struct GameEngine {
    catalog: KnowledgeBase,
    implications: ImplicationEngine,
    plan: TierPlan,
    config: GameConfig,
    state: GameState,
    beliefs: BeliefState,
    asked: BTreeSet<String>,
    answers: Vec<(String, f64)>,
    guessed: Option<String>,
    stop_reason: Option<GuessReason>,
    history: Vec<TurnResult>,
}

impl GameEngine {
    pub fn new(catalog: KnowledgeBase, implications: ImplicationEngine, config: GameConfig) -> Self {
        Self {
            catalog,
            implications,
            plan: TierPlan::default(),
            config,
            state: GameState::NotStarted,
            beliefs: BeliefState::default(),
            asked: BTreeSet::new(),
            answers: Vec::new(),
            guessed: None,
            stop_reason: None,
            history: Vec::new(),
        }
    }

    pub fn with_tier_plan(mut self, plan: TierPlan) -> Self {
        self.plan = plan;
        self
    }

    fn tracker(&self) -> BeliefTracker<'_> {
        BeliefTracker::new(
            &self.catalog,
            &self.implications,
            self.config.tracker_config(),
        )
    }

    fn selector(&self) -> QuestionSelector<'_> {
        QuestionSelector::new(
            &self.catalog,
            self.tracker(),
            &self.implications,
            &self.plan,
            self.config.min_info_gain,
        )
    }

    /// Resets the session and builds the prior.
    pub fn start(&mut self) {
        let tracker = self.tracker();
        let beliefs = if self.config.use_popularity_prior {
            tracker.initialize_popularity()
        } else {
            tracker.initialize()
        };
        self.beliefs = beliefs;
        self.asked.clear();
        self.answers.clear();
        self.history.clear();
        self.guessed = None;
        self.stop_reason = None;
        self.state = GameState::AskingQuestions;
        info!(
            entities = self.beliefs.len(),
            entropy = self.beliefs.entropy(),
            "game started"
        );
    }

    /// Next question, or `None` once the engine is ready to guess.
    pub fn next_question(&mut self) -> Option<Question> {
        if self.state != GameState::AskingQuestions {
            return None;
        }
        if self.beliefs.is_empty() {
            self.state = GameState::MakingGuess;
            return None;
        }

        if let Some(reason) = guess_reason(
            &self.beliefs,
            self.config.guess_threshold,
            self.config.guess_margin,
            self.answers.len(),
            self.config.max_questions,
        ) {
            debug!(?reason, questions = self.answers.len(), "ready to guess");
            self.stop_reason = Some(reason);
            self.state = GameState::MakingGuess;
            return None;
        }
        if self.answers.len() >= self.config.max_questions {
            debug!("question budget spent");
            self.state = GameState::MakingGuess;
            return None;
        }

        let known = self.known_answers();
        let Some(selection) = self.selector().select(&self.beliefs, &self.asked, &known) else {
            self.state = GameState::MakingGuess;
            return None;
        };
        let text = self
            .catalog
            .attribute(&selection.attribute)
            .map(|attr| attr.question.clone())
            .unwrap_or_default();
        Some(Question {
            attribute: selection.attribute,
            text,
            number: self.answers.len() + 1,
            tier: selection.tier,
            info_gain: selection.info_gain,
        })
    }

    /// Records `answer` for `attribute` and updates beliefs.
    ///
    /// Returns `None` outside the asking phase, for attributes the catalog
    /// does not know, and for attributes already answered.
    pub fn process_answer(&mut self, attribute: &str, answer: f64) -> Option<TurnResult> {
        if self.state != GameState::AskingQuestions {
            return None;
        }
        if !self.catalog.contains_attribute(attribute) || self.asked.contains(attribute) {
            debug!(attribute, "answer ignored");
            return None;
        }
        let answer = if answer.is_finite() {
            answer.clamp(0.0, 1.0)
        } else {
            MAYBE_VALUE
        };

        let entropy_before = self.beliefs.entropy();
        self.beliefs = self.tracker().update(&self.beliefs, attribute, answer);
        let entropy_after = self.beliefs.entropy();

        self.asked.insert(attribute.to_string());
        self.answers.push((attribute.to_string(), answer));

        let result = TurnResult {
            question_number: self.answers.len(),
            attribute: attribute.to_string(),
            question_text: self
                .catalog
                .attribute(attribute)
                .map(|attr| attr.question.clone())
                .unwrap_or_default(),
            answer,
            entropy_before,
            entropy_after,
            confidence: self.beliefs.confidence(),
            top_entities: self
                .beliefs
                .top_k(TOP_K)
                .into_iter()
                .map(|(id, p)| (id.to_string(), p))
                .collect(),
        };
        if tracing::enabled!(Level::DEBUG) {
            event!(
                Level::DEBUG,
                question = result.question_number,
                attribute,
                answer,
                entropy_before,
                entropy_after,
                confidence = result.confidence,
                "turn"
            );
        }
        self.history.push(result.clone());
        Some(result)
    }

    /// The most likely entity. Moves the game to the guessing phase.
    pub fn guess(&mut self) -> Option<Guess> {
        if !matches!(
            self.state,
            GameState::AskingQuestions | GameState::MakingGuess
        ) {
            return None;
        }
        let (entity_id, confidence) = self.beliefs.top()?;
        let entity = self.catalog.entity(entity_id)?;
        let guess = Guess {
            entity_id: entity.id.clone(),
            name: entity.name.clone(),
            confidence,
        };
        self.guessed = Some(guess.entity_id.clone());
        if self.state == GameState::AskingQuestions {
            self.state = GameState::MakingGuess;
        }
        info!(
            entity_id = %guess.entity_id,
            confidence,
            questions = self.answers.len(),
            "guess made"
        );
        Some(guess)
    }

    /// Feeds the player's verdict back into the catalog.
    ///
    /// Correct: reinforce and finish. Wrong with a known actual entity:
    /// separate the pair and finish. Wrong but naming the guessed entity
    /// itself: nudge it toward the answers at half rate and finish.
    /// Otherwise move to [`GameState::LearningNew`].
    ///
    /// Only a pending guess is judged; any other state is returned as is.
    pub fn process_guess_result(&mut self, correct: bool, actual_name: Option<&str>) -> GameState {
        if self.state != GameState::MakingGuess {
            return self.state;
        }
        let Some(guessed) = self.guessed.clone() else {
            return self.state;
        };
        let answers = self.answers.clone();
        let learner_config = self.config.learner_config();

        if correct {
            WeightLearner::new(&mut self.catalog, learner_config)
                .update_from_session(&guessed, &answers, true);
            self.commit();
            self.state = GameState::GameOver;
            return self.state;
        }

        let actual = actual_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .and_then(|name| self.catalog.find_entity_by_name(name))
            .map(|entity| entity.id.clone());

        self.state = match actual {
            Some(actual_id) if actual_id == guessed => {
                if WeightLearner::new(&mut self.catalog, learner_config)
                    .update_from_session(&guessed, &answers, false)
                {
                    self.commit();
                }
                GameState::GameOver
            }
            Some(actual_id) => {
                if WeightLearner::new(&mut self.catalog, learner_config)
                    .adjust_weights_for_confusion(&guessed, &actual_id, &answers)
                {
                    self.commit();
                }
                GameState::GameOver
            }
            None => GameState::LearningNew,
        };
        self.state
    }

    /// Adds the entity the player had in mind. Only valid while learning.
    pub fn learn_new_entity(
        &mut self,
        name: &str,
        distinguishing_question: Option<&str>,
        distinguishing_answer: Option<f64>,
    ) -> Option<String> {
        if self.state != GameState::LearningNew || name.trim().is_empty() {
            return None;
        }
        let distinguisher = match (distinguishing_question, distinguishing_answer) {
            (Some(question), Some(answer)) => Some(Distinguisher { question, answer }),
            _ => None,
        };
        let answers = self.answers.clone();
        let entity = WeightLearner::new(&mut self.catalog, self.config.learner_config())
            .learn_new_entity(name, &answers, distinguisher);
        self.commit();
        self.state = GameState::GameOver;
        Some(entity.id)
    }

    /// Drops the session without persisting anything.
    pub fn abort(&mut self) {
        if self.state != GameState::NotStarted {
            info!(questions = self.answers.len(), "game aborted");
        }
        self.beliefs = BeliefState::default();
        self.asked.clear();
        self.answers.clear();
        self.history.clear();
        self.guessed = None;
        self.stop_reason = None;
        self.state = GameState::NotStarted;
    }

    /// Plays from the current state to the guess point.
    pub fn play<A: Answerer + ?Sized>(&mut self, answerer: &mut A) -> Option<Guess> {
        if matches!(self.state, GameState::NotStarted | GameState::GameOver) {
            self.start();
        }
        while let Some(question) = self.next_question() {
            let answer = answerer.answer(&question);
            if self.process_answer(&question.attribute, answer).is_none() {
                break;
            }
        }
        self.guess()
    }

    fn commit(&self) {
        if let Err(err) = self.catalog.save() {
            warn!(error = %err, "failed to persist learned state; continuing in memory");
        }
    }

    /// Direct answers plus their transitive implications.
    pub fn known_answers(&self) -> KnownAnswers {
        self.implications.closure(
            self.answers
                .iter()
                .map(|(attribute, value)| (attribute.as_str(), *value)),
        )
    }

    pub fn top_questions(&self, n: usize) -> Vec<(String, f64)> {
        self.selector()
            .top_questions(&self.beliefs, &self.asked, &self.known_answers(), n)
    }

    pub fn current_state(&self) -> CurrentState {
        CurrentState {
            state: self.state,
            question_number: self.answers.len(),
            entropy: self.beliefs.entropy(),
            confidence: self.beliefs.confidence(),
            top_entities: self
                .beliefs
                .top_k(TOP_K)
                .into_iter()
                .map(|(id, probability)| RankedEntity {
                    id: id.to_string(),
                    name: self
                        .catalog
                        .entity(id)
                        .map(|entity| entity.name.clone())
                        .unwrap_or_else(|| id.to_string()),
                    probability,
                })
                .collect(),
        }
    }

    pub fn game_summary(&self) -> GameSummary {
        GameSummary {
            questions_asked: self.answers.len(),
            guessed_entity: self.guessed.clone(),
            final_confidence: self.beliefs.confidence(),
            final_entropy: self.beliefs.entropy(),
            turns: self
                .history
                .iter()
                .map(|turn| TurnSummary {
                    question: turn.question_text.clone(),
                    entropy_reduction: turn.entropy_reduction(),
                })
                .collect(),
        }
    }

    pub fn stats(&self) -> CatalogStats {
        self.catalog.stats()
    }

    pub fn learning_stats(&self, entity_id: &str) -> Option<EntityLearningStats> {
        self.catalog.learning_stats(entity_id)
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn beliefs(&self) -> &BeliefState {
        &self.beliefs
    }

    pub fn answers(&self) -> &[(String, f64)] {
        &self.answers
    }

    pub fn turn_history(&self) -> &[TurnResult] {
        &self.history
    }

    pub fn stop_reason(&self) -> Option<GuessReason> {
        self.stop_reason
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn catalog(&self) -> &KnowledgeBase {
        &self.catalog
    }

    pub fn implications(&self) -> &ImplicationEngine {
        &self.implications
    }

    /// Hands the catalog back, e.g. to persist after a batch of games.
    pub fn into_catalog(self) -> KnowledgeBase {
        self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::EntityAnswerer;
    use crate::implication::RuleTable;
    use crate::model::{Attribute, Entity};

    fn catalog() -> KnowledgeBase {
        let animal = |id: &str, name: &str, fur: f64, fly: f64, swim: f64| {
            Entity::new(id, name)
                .with_attribute("is_animal", 1.0)
                .with_attribute("has_fur", fur)
                .with_attribute("can_fly", fly)
                .with_attribute("can_swim", swim)
        };
        KnowledgeBase::in_memory(
            vec![
                animal("dog", "a dog", 1.0, 0.0, 0.6),
                animal("eagle", "an eagle", 0.0, 1.0, 0.0),
                animal("salmon", "a salmon", 0.0, 0.0, 1.0),
                animal("bat", "a bat", 1.0, 1.0, 0.0),
                Entity::new("rock", "a rock").with_attribute("is_animal", 0.0),
            ],
            vec![
                Attribute::new("is_animal", "Is it an animal?"),
                Attribute::new("has_fur", "Does it have fur?"),
                Attribute::new("can_fly", "Can it fly?"),
                Attribute::new("can_swim", "Can it swim?"),
            ],
        )
    }

    fn engine() -> GameEngine {
        GameEngine::new(catalog(), ImplicationEngine::empty(), GameConfig::default())
            .with_tier_plan(TierPlan::flat())
    }

    #[test]
    fn nothing_happens_before_start() {
        let mut engine = engine();
        assert_eq!(engine.state(), GameState::NotStarted);
        assert!(engine.next_question().is_none());
        assert!(engine.process_answer("has_fur", 1.0).is_none());
        assert!(engine.guess().is_none());
        assert_eq!(engine.process_guess_result(true, None), GameState::NotStarted);
    }

    #[test]
    fn verdict_is_applied_once_per_guess() {
        let mut engine = engine();
        engine.start();
        engine.process_answer("has_fur", 1.0).unwrap();
        let guess = engine.guess().unwrap();
        assert_eq!(engine.process_guess_result(true, None), GameState::GameOver);
        let weight = engine
            .catalog()
            .entity(&guess.entity_id)
            .unwrap()
            .attribute_probability("has_fur");

        assert_eq!(engine.process_guess_result(true, None), GameState::GameOver);
        assert_eq!(engine.process_guess_result(false, Some("a rock")), GameState::GameOver);
        assert!(engine.guess().is_none());
        let stats = engine.learning_stats(&guess.entity_id).unwrap();
        assert_eq!(stats.times_played, 1);
        assert_eq!(stats.times_guessed_correctly, 1);
        assert_eq!(
            engine
                .catalog()
                .entity(&guess.entity_id)
                .unwrap()
                .attribute_probability("has_fur"),
            weight
        );
        assert_eq!(engine.stats().total_games_played, 1);
    }

    #[test]
    fn no_verdict_after_learning_a_new_entity() {
        let mut engine = engine();
        engine.start();
        engine.process_answer("can_swim", 1.0).unwrap();
        engine.guess().unwrap();
        engine.process_guess_result(false, None);
        let id = engine.learn_new_entity("an otter", None, None).unwrap();
        let played = engine.stats().total_games_played;

        assert_eq!(
            engine.process_guess_result(false, Some("an otter")),
            GameState::GameOver
        );
        assert_eq!(engine.stats().total_games_played, played);
        assert_eq!(engine.learning_stats(&id).unwrap().times_played, 1);
    }

    #[test]
    fn naming_the_guessed_entity_teaches_it_at_half_rate() {
        let mut engine = engine();
        engine.start();
        engine.process_answer("can_swim", 1.0).unwrap();
        engine.process_answer("has_fur", 1.0).unwrap();
        assert_eq!(engine.guess().unwrap().entity_id, "dog");

        assert_eq!(
            engine.process_guess_result(false, Some("the dog")),
            GameState::GameOver
        );
        let config = engine.config().learner_config();
        let expected = config.step(0.6, 1.0, config.learning_rate * 0.5);
        let dog = engine.catalog().entity("dog").unwrap();
        assert!((dog.attribute_probability("can_swim") - expected).abs() < 1e-12);
        let stats = engine.learning_stats("dog").unwrap();
        assert_eq!(stats.times_played, 1);
        assert_eq!(stats.times_guessed_correctly, 0);
    }

    #[test]
    fn turn_result_reports_entropy_change() {
        let mut engine = engine();
        engine.start();
        let question = engine.next_question().unwrap();
        assert_eq!(question.number, 1);
        let turn = engine.process_answer(&question.attribute, 1.0).unwrap();
        assert_eq!(turn.question_number, 1);
        assert!(turn.entropy_after < turn.entropy_before);
        assert_eq!(turn.top_entities.len(), 5);
        assert_eq!(engine.turn_history().len(), 1);

        // Re-answering is a no-op, as is an unknown attribute.
        assert!(engine.process_answer(&question.attribute, 0.0).is_none());
        assert!(engine.process_answer("has_wheels", 1.0).is_none());
        assert_eq!(engine.answers().len(), 1);
    }

    #[test]
    fn play_reaches_a_guess_and_correct_result_ends_the_game() {
        let mut engine = engine();
        let target = engine.catalog().entity("eagle").unwrap().clone();
        let mut answerer = EntityAnswerer::new(&target, engine.implications());
        let guess = engine.play(&mut answerer).unwrap();
        assert_eq!(guess.entity_id, "eagle");
        assert_eq!(engine.state(), GameState::MakingGuess);

        assert_eq!(engine.process_guess_result(true, None), GameState::GameOver);
        let stats = engine.learning_stats("eagle").unwrap();
        assert_eq!(stats.times_played, 1);
        assert_eq!(stats.times_guessed_correctly, 1);
        assert_eq!(engine.game_summary().guessed_entity.as_deref(), Some("eagle"));
    }

    #[test]
    fn wrong_guess_with_known_name_adjusts_both_entities() {
        let mut engine = engine();
        engine.start();
        engine.process_answer("is_animal", 1.0).unwrap();
        let guess = engine.guess().unwrap();
        let other = if guess.entity_id == "dog" { "The Bat" } else { "dog" };

        assert_eq!(engine.process_guess_result(false, Some(other)), GameState::GameOver);
        assert_eq!(engine.stats().total_games_played, 2);
        assert_eq!(engine.stats().total_correct_guesses, 0);
    }

    #[test]
    fn wrong_guess_with_unknown_name_moves_to_learning() {
        let mut engine = engine();
        engine.start();
        engine.process_answer("can_swim", 1.0).unwrap();
        engine.process_answer("has_fur", 1.0).unwrap();
        engine.guess().unwrap();
        assert_eq!(
            engine.process_guess_result(false, Some("an otter")),
            GameState::LearningNew
        );

        let id = engine.learn_new_entity("an otter", None, None).unwrap();
        assert_eq!(engine.state(), GameState::GameOver);
        let otter = engine.catalog().entity(&id).unwrap();
        assert_eq!(otter.attributes.len(), 2);
        assert_eq!(otter.attribute_probability("can_swim"), 1.0);
        assert_eq!(otter.attribute_probability("has_fur"), 1.0);

        // Learning is only valid right after a missed guess.
        assert!(engine.learn_new_entity("a beaver", None, None).is_none());
    }

    #[test]
    fn missing_name_also_moves_to_learning() {
        let mut engine = engine();
        engine.start();
        engine.guess().unwrap();
        assert_eq!(engine.process_guess_result(false, None), GameState::LearningNew);
        assert_eq!(engine.learn_new_entity("   ", None, None), None);
    }

    #[test]
    fn known_answers_include_implications() {
        let rules = ImplicationEngine::new(RuleTable::new().rule("can_fly", true, &[("has_fur", 0.0)]));
        let mut engine = GameEngine::new(catalog(), rules, GameConfig::default())
            .with_tier_plan(TierPlan::flat());
        engine.start();
        engine.process_answer("can_fly", 1.0).unwrap();
        let known = engine.known_answers();
        assert_eq!(known.get("has_fur"), Some(&0.0));

        if let Some(question) = engine.next_question() {
            assert_ne!(question.attribute, "has_fur");
            assert_ne!(question.attribute, "can_fly");
        }
    }

    #[test]
    fn question_budget_forces_a_guess() {
        let config = GameConfig {
            max_questions: 1,
            guess_threshold: 1.0,
            guess_margin: 1.0,
            ..GameConfig::default()
        };
        let mut engine =
            GameEngine::new(catalog(), ImplicationEngine::empty(), config).with_tier_plan(TierPlan::flat());
        engine.start();
        let question = engine.next_question().unwrap();
        engine.process_answer(&question.attribute, MAYBE_VALUE).unwrap();
        assert!(engine.next_question().is_none());
        assert_eq!(engine.state(), GameState::MakingGuess);
    }

    #[test]
    fn abort_discards_the_session() {
        let mut engine = engine();
        engine.start();
        engine.process_answer("has_fur", 1.0).unwrap();
        engine.abort();
        assert_eq!(engine.state(), GameState::NotStarted);
        assert!(engine.answers().is_empty());
        assert_eq!(engine.stats().total_games_played, 0);
    }

    #[test]
    fn empty_catalog_goes_straight_to_guessing() {
        let mut engine = GameEngine::new(
            KnowledgeBase::default(),
            ImplicationEngine::default(),
            GameConfig::default(),
        );
        engine.start();
        assert!(engine.next_question().is_none());
        assert!(engine.guess().is_none());
        let state = engine.current_state();
        assert_eq!(state.state, GameState::MakingGuess);
        assert!(state.top_entities.is_empty());
    }
}
