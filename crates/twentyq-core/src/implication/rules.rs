use std::collections::BTreeMap;

/// `(attribute, definitive answer) -> [(implied attribute, implied value)]`.
///
/// Keys iterate in sorted order so every traversal of the table is
/// deterministic. Implied values are soft: 0.9 means "very likely yes".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleTable {
    rules: BTreeMap<(String, bool), Vec<(String, f64)>>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`RuleTable::insert`].
    pub fn rule(mut self, attribute: &str, answer: bool, implied: &[(&str, f64)]) -> Self {
        self.insert(attribute, answer, implied);
        self
    }

    /// Appends implications for `(attribute, answer)`, keeping earlier entries first.
    pub fn insert(&mut self, attribute: &str, answer: bool, implied: &[(&str, f64)]) {
        let entry = self
            .rules
            .entry((attribute.to_string(), answer))
            .or_default();
        entry.extend(
            implied
                .iter()
                .map(|(attr, value)| ((*attr).to_string(), *value)),
        );
    }

    pub fn get(&self, attribute: &str, answer: bool) -> &[(String, f64)] {
        self.rules
            .get(&(attribute.to_string(), answer))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool, &[(String, f64)])> {
        self.rules
            .iter()
            .map(|((attr, answer), implied)| (attr.as_str(), *answer, implied.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Taxonomy, anatomy, size, diet, habitat and material rules for the
    /// animal / vegetable / mineral catalog.
    pub fn default_rules() -> Self {
        Self::new()
            // Top-level split.
            .rule(
                "is_animal",
                true,
                &[
                    ("is_vegetable", 0.0),
                    ("is_mineral", 0.0),
                    ("is_living", 1.0),
                    ("is_natural", 0.9),
                ],
            )
            .rule(
                "is_animal",
                false,
                &[
                    ("is_mammal", 0.0),
                    ("is_bird", 0.0),
                    ("is_fish", 0.0),
                    ("is_reptile", 0.0),
                    ("is_amphibian", 0.0),
                    ("is_insect", 0.0),
                    ("is_arachnid", 0.0),
                    ("is_crustacean", 0.0),
                    ("is_mollusk", 0.0),
                    ("is_primate", 0.0),
                    ("is_rodent", 0.0),
                    ("is_feline", 0.0),
                    ("is_canine", 0.0),
                    ("is_bovine", 0.0),
                    ("is_equine", 0.0),
                    ("is_cetacean", 0.0),
                    ("is_marsupial", 0.0),
                    ("is_carnivore", 0.0),
                    ("is_herbivore", 0.0),
                    ("is_omnivore", 0.0),
                    ("is_predator", 0.0),
                    ("is_domesticated", 0.0),
                    ("is_pet", 0.0),
                    ("is_farm_animal", 0.0),
                    ("is_wild", 0.0),
                ],
            )
            .rule(
                "is_vegetable",
                true,
                &[
                    ("is_animal", 0.0),
                    ("is_mineral", 0.0),
                    ("is_living", 1.0),
                    ("is_natural", 1.0),
                ],
            )
            .rule(
                "is_vegetable",
                false,
                &[
                    ("is_fruit", 0.0),
                    ("is_vegetable_food", 0.0),
                    ("is_nut", 0.0),
                    ("is_herb", 0.0),
                    ("is_flower", 0.0),
                    ("is_tree", 0.0),
                    ("is_fungus", 0.0),
                    ("is_berry", 0.0),
                    ("is_citrus", 0.0),
                    ("grows_on_trees", 0.0),
                    ("grows_underground", 0.0),
                    ("has_leaves", 0.0),
                    ("has_seeds", 0.0),
                ],
            )
            .rule(
                "is_mineral",
                true,
                &[("is_animal", 0.0), ("is_vegetable", 0.0), ("is_living", 0.0)],
            )
            .rule(
                "is_mineral",
                false,
                &[
                    ("is_electronic", 0.0),
                    ("is_vehicle", 0.0),
                    ("is_furniture", 0.0),
                    ("is_clothing", 0.0),
                    ("is_jewelry", 0.0),
                    ("is_appliance", 0.0),
                    ("is_instrument", 0.0),
                    ("is_tool", 0.0),
                    ("requires_batteries", 0.0),
                    ("plugs_in", 0.0),
                    ("has_screen", 0.0),
                ],
            )
            // Animal classes.
            .rule(
                "is_mammal",
                true,
                &[
                    ("is_animal", 1.0),
                    ("is_bird", 0.0),
                    ("is_fish", 0.0),
                    ("is_reptile", 0.0),
                    ("is_amphibian", 0.0),
                    ("is_insect", 0.0),
                    ("has_fur", 0.9),
                    ("gives_live_birth", 0.9),
                    ("lays_eggs", 0.1),
                    ("has_feathers", 0.0),
                ],
            )
            .rule(
                "is_mammal",
                false,
                &[
                    ("is_primate", 0.0),
                    ("is_rodent", 0.0),
                    ("is_feline", 0.0),
                    ("is_canine", 0.0),
                    ("is_bovine", 0.0),
                    ("is_equine", 0.0),
                    ("is_cetacean", 0.0),
                    ("is_marsupial", 0.0),
                ],
            )
            .rule(
                "is_bird",
                true,
                &[
                    ("is_animal", 1.0),
                    ("is_mammal", 0.0),
                    ("is_fish", 0.0),
                    ("is_reptile", 0.0),
                    ("is_insect", 0.0),
                    ("has_feathers", 1.0),
                    ("has_wings", 1.0),
                    ("has_beak", 1.0),
                    ("lays_eggs", 1.0),
                    ("has_fur", 0.0),
                    ("has_four_legs", 0.0),
                    ("gives_live_birth", 0.0),
                ],
            )
            .rule(
                "is_fish",
                true,
                &[
                    ("is_animal", 1.0),
                    ("is_mammal", 0.0),
                    ("is_bird", 0.0),
                    ("is_reptile", 0.0),
                    ("is_insect", 0.0),
                    ("lives_in_water", 1.0),
                    ("can_swim", 1.0),
                    ("has_fins", 1.0),
                    ("has_scales", 0.9),
                    ("has_fur", 0.0),
                    ("has_feathers", 0.0),
                    ("has_four_legs", 0.0),
                    ("can_fly", 0.0),
                ],
            )
            .rule(
                "is_reptile",
                true,
                &[
                    ("is_animal", 1.0),
                    ("is_mammal", 0.0),
                    ("is_bird", 0.0),
                    ("is_fish", 0.0),
                    ("is_insect", 0.0),
                    ("has_scales", 0.95),
                    ("lays_eggs", 0.9),
                    ("has_fur", 0.0),
                    ("has_feathers", 0.0),
                ],
            )
            .rule(
                "is_amphibian",
                true,
                &[
                    ("is_animal", 1.0),
                    ("is_mammal", 0.0),
                    ("is_bird", 0.0),
                    ("is_fish", 0.0),
                    ("is_reptile", 0.0),
                    ("can_swim", 0.95),
                    ("lays_eggs", 1.0),
                    ("has_fur", 0.0),
                    ("has_feathers", 0.0),
                    ("lives_in_water", 0.7),
                ],
            )
            .rule(
                "is_insect",
                true,
                &[
                    ("is_animal", 1.0),
                    ("is_mammal", 0.0),
                    ("is_bird", 0.0),
                    ("is_fish", 0.0),
                    ("is_reptile", 0.0),
                    ("has_many_legs", 1.0),
                    ("is_small", 1.0),
                    ("has_fur", 0.0),
                    ("has_feathers", 0.0),
                    ("is_large", 0.0),
                    ("lays_eggs", 1.0),
                ],
            )
            // Families.
            .rule(
                "is_primate",
                true,
                &[("is_mammal", 1.0), ("is_animal", 1.0), ("can_climb", 0.9)],
            )
            .rule(
                "is_feline",
                true,
                &[
                    ("is_mammal", 1.0),
                    ("is_animal", 1.0),
                    ("is_carnivore", 0.95),
                    ("has_claws", 1.0),
                ],
            )
            .rule(
                "is_canine",
                true,
                &[("is_mammal", 1.0), ("is_animal", 1.0), ("has_fur", 1.0)],
            )
            .rule(
                "is_cetacean",
                true,
                &[
                    ("is_mammal", 1.0),
                    ("is_animal", 1.0),
                    ("lives_in_water", 1.0),
                    ("lives_in_ocean", 0.95),
                    ("can_swim", 1.0),
                    ("is_large", 0.9),
                    ("has_fins", 1.0),
                    ("has_fur", 0.0),
                ],
            )
            .rule(
                "is_marsupial",
                true,
                &[
                    ("is_mammal", 1.0),
                    ("is_animal", 1.0),
                    ("has_pouch", 1.0),
                    ("lives_in_australia", 0.6),
                ],
            )
            .rule(
                "is_equine",
                true,
                &[
                    ("is_mammal", 1.0),
                    ("is_animal", 1.0),
                    ("has_hooves", 1.0),
                    ("has_four_legs", 1.0),
                    ("is_herbivore", 1.0),
                ],
            )
            .rule(
                "is_bovine",
                true,
                &[
                    ("is_mammal", 1.0),
                    ("is_animal", 1.0),
                    ("has_hooves", 1.0),
                    ("has_four_legs", 1.0),
                    ("is_herbivore", 1.0),
                ],
            )
            .rule(
                "is_rodent",
                true,
                &[("is_mammal", 1.0), ("is_animal", 1.0), ("is_small", 0.9)],
            )
            // Anatomy.
            .rule(
                "has_feathers",
                true,
                &[("is_bird", 0.95), ("has_fur", 0.0), ("has_scales", 0.0)],
            )
            .rule(
                "has_trunk",
                true,
                &[("is_mammal", 1.0), ("is_large", 1.0)],
            )
            .rule(
                "has_hooves",
                true,
                &[("is_mammal", 1.0), ("has_claws", 0.0)],
            )
            .rule(
                "has_fins",
                true,
                &[("can_swim", 1.0), ("has_four_legs", 0.0)],
            )
            .rule(
                "has_pouch",
                true,
                &[("is_marsupial", 1.0), ("is_mammal", 1.0)],
            )
            // Size.
            .rule(
                "is_large",
                true,
                &[("is_small", 0.0)],
            )
            .rule(
                "is_small",
                true,
                &[("is_large", 0.0)],
            )
            // Domestication.
            .rule(
                "is_pet",
                true,
                &[("is_domesticated", 1.0), ("is_animal", 1.0), ("is_wild", 0.1)],
            )
            .rule(
                "is_farm_animal",
                true,
                &[("is_domesticated", 1.0), ("is_animal", 1.0), ("is_wild", 0.1)],
            )
            .rule(
                "is_domesticated",
                true,
                &[("is_animal", 1.0), ("is_wild", 0.2)],
            )
            .rule(
                "is_wild",
                true,
                &[("is_animal", 1.0), ("is_pet", 0.1), ("is_domesticated", 0.2)],
            )
            // Diet.
            .rule(
                "is_carnivore",
                true,
                &[("is_animal", 1.0), ("is_herbivore", 0.0), ("is_predator", 0.9)],
            )
            .rule(
                "is_herbivore",
                true,
                &[("is_animal", 1.0), ("is_carnivore", 0.0), ("is_predator", 0.0)],
            )
            // Habitat.
            .rule(
                "lives_in_water",
                true,
                &[("can_swim", 1.0), ("can_fly", 0.1)],
            )
            .rule(
                "lives_in_ocean",
                true,
                &[("lives_in_water", 1.0), ("can_swim", 1.0)],
            )
            .rule("can_fly", true, &[("has_wings", 1.0)])
            // Plants.
            .rule(
                "is_fruit",
                true,
                &[
                    ("is_vegetable", 1.0),
                    ("has_seeds", 0.95),
                    ("is_food", 1.0),
                    ("is_animal", 0.0),
                    ("is_mineral", 0.0),
                    ("is_vegetable_food", 0.1),
                ],
            )
            .rule(
                "is_vegetable_food",
                true,
                &[
                    ("is_vegetable", 1.0),
                    ("is_food", 1.0),
                    ("is_animal", 0.0),
                    ("is_mineral", 0.0),
                    ("is_fruit", 0.2),
                ],
            )
            .rule(
                "is_berry",
                true,
                &[
                    ("is_vegetable", 1.0),
                    ("is_fruit", 1.0),
                    ("is_small", 1.0),
                    ("is_food", 1.0),
                ],
            )
            .rule(
                "is_citrus",
                true,
                &[
                    ("is_vegetable", 1.0),
                    ("is_fruit", 1.0),
                    ("is_food", 1.0),
                    ("is_sour", 0.8),
                    ("is_berry", 0.0),
                ],
            )
            .rule(
                "is_tree",
                true,
                &[
                    ("is_vegetable", 1.0),
                    ("has_leaves", 0.95),
                    ("is_large", 0.8),
                    ("is_animal", 0.0),
                    ("is_mineral", 0.0),
                ],
            )
            .rule(
                "is_flower",
                true,
                &[("is_vegetable", 1.0), ("is_animal", 0.0), ("is_mineral", 0.0)],
            )
            .rule(
                "is_fungus",
                true,
                &[("is_vegetable", 1.0), ("is_animal", 0.0), ("is_mineral", 0.0)],
            )
            .rule("grows_on_trees", true, &[("is_vegetable", 1.0)])
            .rule("grows_underground", true, &[("is_vegetable", 1.0)])
            .rule("has_leaves", true, &[("is_vegetable", 1.0)])
            // Objects and materials.
            .rule(
                "is_electronic",
                true,
                &[
                    ("is_mineral", 1.0),
                    ("is_manmade", 1.0),
                    ("is_animal", 0.0),
                    ("is_vegetable", 0.0),
                    ("is_living", 0.0),
                ],
            )
            .rule(
                "is_vehicle",
                true,
                &[
                    ("is_mineral", 1.0),
                    ("is_manmade", 1.0),
                    ("has_wheels", 0.8),
                    ("is_animal", 0.0),
                    ("is_vegetable", 0.0),
                ],
            )
            .rule(
                "is_furniture",
                true,
                &[
                    ("is_mineral", 1.0),
                    ("is_manmade", 1.0),
                    ("is_animal", 0.0),
                    ("is_vegetable", 0.0),
                    ("found_at_home", 0.9),
                ],
            )
            .rule(
                "is_clothing",
                true,
                &[
                    ("is_mineral", 1.0),
                    ("is_manmade", 1.0),
                    ("is_worn", 1.0),
                    ("is_animal", 0.0),
                    ("is_vegetable", 0.0),
                ],
            )
            .rule(
                "is_appliance",
                true,
                &[
                    ("is_mineral", 1.0),
                    ("is_manmade", 1.0),
                    ("is_electronic", 0.9),
                    ("plugs_in", 0.9),
                ],
            )
            .rule(
                "is_tool",
                true,
                &[("is_mineral", 1.0), ("is_manmade", 1.0), ("is_animal", 0.0)],
            )
            .rule(
                "is_instrument",
                true,
                &[("is_mineral", 1.0), ("is_manmade", 1.0), ("makes_music", 1.0)],
            )
            .rule(
                "is_jewelry",
                true,
                &[("is_mineral", 1.0), ("is_manmade", 1.0), ("is_worn", 1.0)],
            )
            .rule(
                "has_screen",
                true,
                &[("is_electronic", 1.0), ("is_mineral", 1.0)],
            )
            .rule(
                "requires_batteries",
                true,
                &[("is_electronic", 1.0), ("is_mineral", 1.0)],
            )
            .rule(
                "plugs_in",
                true,
                &[("is_electronic", 1.0), ("is_mineral", 1.0)],
            )
            .rule(
                "is_metal",
                true,
                &[("is_mineral", 1.0), ("is_hard", 0.95), ("is_animal", 0.0)],
            )
            .rule(
                "is_plastic",
                true,
                &[("is_mineral", 1.0), ("is_manmade", 1.0), ("is_animal", 0.0)],
            )
            .rule(
                "is_glass",
                true,
                &[
                    ("is_mineral", 1.0),
                    ("is_transparent", 0.9),
                    ("is_hard", 1.0),
                ],
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rule_is_empty_slice() {
        let table = RuleTable::new().rule("is_bird", true, &[("has_wings", 1.0)]);
        assert!(table.get("is_bird", false).is_empty());
        assert!(table.get("is_fish", true).is_empty());
        assert_eq!(table.get("is_bird", true), &[("has_wings".to_string(), 1.0)]);
    }

    #[test]
    fn insert_appends_to_existing_key() {
        let mut table = RuleTable::new();
        table.insert("is_pet", true, &[("is_animal", 1.0)]);
        table.insert("is_pet", true, &[("is_wild", 0.1)]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("is_pet", true).len(), 2);
    }

    #[test]
    fn default_rules_cover_the_top_level_split() {
        let table = RuleTable::default_rules();
        for attr in ["is_animal", "is_vegetable", "is_mineral"] {
            assert!(!table.get(attr, true).is_empty(), "{attr}=yes");
            assert!(!table.get(attr, false).is_empty(), "{attr}=no");
        }
    }

    #[test]
    fn default_implied_values_are_probabilities() {
        for (_, _, implied) in RuleTable::default_rules().iter() {
            for (_, value) in implied {
                assert!((0.0..=1.0).contains(value));
            }
        }
    }
}
