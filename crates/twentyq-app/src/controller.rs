use std::io::{self, BufRead, Write};

use tracing::info;

use twentyq_core::catalog::CatalogStats;
use twentyq_core::game::{GameEngine, GameState, Guess};

use crate::console::Console;

const DEBUG_TOP: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameOutcome {
    /// The guess was confirmed.
    Won,
    /// Wrong guess; the player named an entity already in the catalog.
    Corrected { actual_id: String },
    /// Wrong guess; a new entity was added.
    Learned { entity_id: String },
    /// Wrong guess and the player gave no name.
    Lost,
    /// The catalog had nothing to guess.
    NothingToGuess,
    /// Input ended mid-game; nothing was saved.
    Quit,
}

/// Drives one [`GameEngine`] through console prompts.
pub struct SessionController {
    engine: GameEngine,
    debug: bool,
}

impl SessionController {
    pub fn new(engine: GameEngine, debug: bool) -> Self {
        Self { engine, debug }
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    /// Plays games until the player declines another or input ends.
    pub fn run<R: BufRead, W: Write>(&mut self, console: &mut Console<R, W>) -> io::Result<()> {
        loop {
            let outcome = self.play_one(console)?;
            info!(?outcome, "game finished");
            if matches!(outcome, GameOutcome::Quit | GameOutcome::NothingToGuess) {
                return Ok(());
            }
            let stats = self.engine.stats();
            console.say(format!(
                "I've won {} of {} games ({:.0}%).",
                stats.total_correct_guesses,
                stats.total_games_played,
                stats.overall_accuracy * 100.0
            ))?;
            if console.confirm("Play again? (y/n)")? != Some(true) {
                return Ok(());
            }
        }
    }

    pub fn play_one<R: BufRead, W: Write>(
        &mut self,
        console: &mut Console<R, W>,
    ) -> io::Result<GameOutcome> {
        self.engine.start();
        console.say("")?;
        console.say("Think of an animal, a plant, or an object. I'll try to guess it.")?;

        while let Some(question) = self.engine.next_question() {
            let prompt = format!("Q{}: {}", question.number, question.text);
            let Some(answer) = console.ask_answer(&prompt)? else {
                self.engine.abort();
                return Ok(GameOutcome::Quit);
            };
            if self
                .engine
                .process_answer(&question.attribute, answer.value())
                .is_none()
            {
                break;
            }
            if self.debug {
                self.write_debug(console)?;
            }
        }

        let Some(guess) = self.engine.guess() else {
            self.engine.abort();
            console.say("I don't know anything yet, so I can't guess.")?;
            return Ok(GameOutcome::NothingToGuess);
        };
        if self.debug {
            if let Some(reason) = self.engine.stop_reason() {
                console.say(format!("  [stopped: {reason:?}]"))?;
            }
        }

        let prompt = format!(
            "Is it {}? ({:.0}% sure) (y/n)",
            guess.name,
            guess.confidence * 100.0
        );
        let Some(correct) = console.confirm(&prompt)? else {
            self.engine.abort();
            return Ok(GameOutcome::Quit);
        };
        if correct {
            self.engine.process_guess_result(true, None);
            console.say(format!(
                "Got it in {} questions!",
                self.engine.answers().len()
            ))?;
            return Ok(GameOutcome::Won);
        }
        self.handle_wrong_guess(console, &guess)
    }

    fn handle_wrong_guess<R: BufRead, W: Write>(
        &mut self,
        console: &mut Console<R, W>,
        guess: &Guess,
    ) -> io::Result<GameOutcome> {
        let name = console
            .read_line("Oh no! What were you thinking of?")?
            .unwrap_or_default();
        if name.is_empty() {
            self.engine.abort();
            console.say("Fair enough. Maybe next time.")?;
            return Ok(GameOutcome::Lost);
        }

        if self.engine.process_guess_result(false, Some(&name)) != GameState::LearningNew {
            let actual_id = self
                .engine
                .catalog()
                .find_entity_by_name(&name)
                .map(|entity| entity.id.clone())
                .unwrap_or_default();
            if actual_id == guess.entity_id {
                console.say(format!("I'll remember that about {}.", guess.name))?;
            } else {
                console.say(format!(
                    "I'll remember how {name} differs from {}.",
                    guess.name
                ))?;
            }
            return Ok(GameOutcome::Corrected { actual_id });
        }

        let question = console
            .read_line(&format!(
                "What question would tell {name} apart from {}? (blank to skip)",
                guess.name
            ))?
            .unwrap_or_default();
        let distinguishing = if question.is_empty() {
            None
        } else {
            console
                .ask_answer(&format!("And for {name}, the answer is? (y/n/m)"))?
                .map(|answer| (question, answer.value()))
        };

        let (text, value) = match &distinguishing {
            Some((text, value)) => (Some(text.as_str()), Some(*value)),
            None => (None, None),
        };
        match self.engine.learn_new_entity(&name, text, value) {
            Some(entity_id) => {
                console.say(format!("Thanks! I've learned about {name}."))?;
                Ok(GameOutcome::Learned { entity_id })
            }
            None => {
                self.engine.abort();
                Ok(GameOutcome::Lost)
            }
        }
    }

    fn write_debug<R: BufRead, W: Write>(&self, console: &mut Console<R, W>) -> io::Result<()> {
        let state = self.engine.current_state();
        console.say(format!(
            "  [entropy {:.2} bits | confidence {:.0}% | {}/{} questions | {} candidates]",
            state.entropy,
            state.confidence * 100.0,
            state.question_number,
            self.engine.config().max_questions,
            self.engine.beliefs().len()
        ))?;
        for (rank, entity) in state.top_entities.iter().take(DEBUG_TOP).enumerate() {
            console.say(format!(
                "    {}. {:<20} {:>5.1}%",
                rank + 1,
                entity.name,
                entity.probability * 100.0
            ))?;
        }
        Ok(())
    }
}

pub fn write_stats<W: Write>(out: &mut W, stats: &CatalogStats) -> io::Result<()> {
    writeln!(out, "Entities:              {}", stats.total_entities)?;
    writeln!(out, "Attributes:            {}", stats.total_attributes)?;
    writeln!(out, "Entities with plays:   {}", stats.entities_with_play_data)?;
    writeln!(out, "Games played:          {}", stats.total_games_played)?;
    writeln!(out, "Correct guesses:       {}", stats.total_correct_guesses)?;
    writeln!(
        out,
        "Overall accuracy:      {:.1}%",
        stats.overall_accuracy * 100.0
    )
}
