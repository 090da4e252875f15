use crate::filter::{Filter, TagLiteral, TagRule};

/// A node in the rule tree: either a whole rule or one literal inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeRef {
    Rule(usize),
    Literal(usize, usize),
}

/// Interactive editor for the OR-of-ANDs tag tree behind a [`Filter`].
///
/// Literal slots start empty and are filled in by `set_literal`; empty slots
/// never survive `commit`, so a committed filter only carries rules with at
/// least one literal.
pub struct FilterBuilder {
    pattern: String,
    strict: bool,
    rules: Vec<Vec<Option<TagLiteral>>>,
    active: Option<NodeRef>,
}

impl FilterBuilder {
    pub fn new() -> FilterBuilder {
        FilterBuilder {
            pattern: String::new(),
            strict: true,
            rules: Vec::new(),
            active: None,
        }
    }

    /// Seeds the editor from an existing filter so it can be re-edited.
    pub fn from_filter(filter: &Filter) -> FilterBuilder {
        FilterBuilder {
            pattern: filter.pattern().to_string(),
            strict: filter.is_strict(),
            rules: filter
                .rules()
                .iter()
                .map(|rule| rule.literals.iter().cloned().map(Some).collect())
                .collect(),
            active: None,
        }
    }

    pub fn set_pattern(&mut self, pattern: &str) {
        self.pattern = pattern.to_string();
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Starts a new AND-group with one empty literal slot and makes that
    /// slot active.
    pub fn add_rule(&mut self) {
        self.rules.push(vec![None]);
        self.active = Some(NodeRef::Literal(self.rules.len() - 1, 0));
    }

    /// Appends an empty literal slot to the active rule and makes it active.
    pub fn add_literal(&mut self) {
        let Some(rule) = self.active_rule() else {
            return;
        };
        self.rules[rule].push(None);
        self.active = Some(NodeRef::Literal(rule, self.rules[rule].len() - 1));
    }

    /// Fills the active literal slot. When a rule header is active, its
    /// first slot is the target.
    pub fn set_literal(&mut self, tag: &str, negated: bool) {
        let Some((rule, slot)) = self.active_literal() else {
            return;
        };
        self.rules[rule][slot] = Some(TagLiteral {
            tag: tag.to_string(),
            required: !negated,
        });
    }

    /// Flips the polarity of the active literal, if it is set.
    pub fn negate(&mut self) {
        let Some((rule, slot)) = self.active_literal() else {
            return;
        };
        if let Some(literal) = &mut self.rules[rule][slot] {
            literal.required = !literal.required;
        }
    }

    /// Removes the active node. Removing a rule's last literal removes the
    /// rule as well. The previous node in display order becomes active.
    pub fn delete(&mut self) {
        let Some(active) = self.active else {
            return;
        };
        let flat = self.flatten();
        let position = flat.iter().position(|node| *node == active);
        match active {
            NodeRef::Rule(rule) => {
                self.rules.remove(rule);
            }
            NodeRef::Literal(rule, slot) => {
                self.rules[rule].remove(slot);
                if self.rules[rule].is_empty() {
                    self.rules.remove(rule);
                }
            }
        }
        let flat = self.flatten();
        self.active = match position {
            Some(position) if position > 0 => flat.get(position - 1).copied(),
            _ => flat.first().copied(),
        };
    }

    /// Moves the active marker one node up in display order.
    pub fn move_up(&mut self) {
        self.step_active(-1);
    }

    /// Moves the active marker one node down in display order.
    pub fn move_down(&mut self) {
        self.step_active(1);
    }

    /// The `"a" AND NOT "b" OR ...` display string for the current tree.
    pub fn summary(&self) -> String {
        let rendered: Vec<String> = self
            .rules
            .iter()
            .map(|rule| {
                rule.iter()
                    .flatten()
                    .map(|literal| {
                        format!(
                            "{}\"{}\"",
                            if literal.required { "" } else { "NOT " },
                            literal.tag
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(" AND ")
            })
            .filter(|text| !text.is_empty())
            .collect();
        rendered.join(" OR ")
    }

    /// Produces the immutable filter snapshot. Empty literal slots are
    /// dropped, and rules left without literals are dropped with them.
    pub fn commit(&self) -> Result<Filter, String> {
        let rules: Vec<TagRule> = self
            .rules
            .iter()
            .map(|rule| TagRule {
                literals: rule.iter().flatten().cloned().collect(),
            })
            .filter(|rule| !rule.literals.is_empty())
            .collect();
        Filter::new(&self.pattern, rules, self.strict)
    }

    fn active_rule(&self) -> Option<usize> {
        match self.active? {
            NodeRef::Rule(rule) => Some(rule),
            NodeRef::Literal(rule, _) => Some(rule),
        }
    }

    fn active_literal(&self) -> Option<(usize, usize)> {
        match self.active? {
            NodeRef::Rule(rule) => (!self.rules[rule].is_empty()).then_some((rule, 0)),
            NodeRef::Literal(rule, slot) => Some((rule, slot)),
        }
    }

    fn flatten(&self) -> Vec<NodeRef> {
        let mut nodes = Vec::new();
        for (rule, slots) in self.rules.iter().enumerate() {
            nodes.push(NodeRef::Rule(rule));
            for slot in 0..slots.len() {
                nodes.push(NodeRef::Literal(rule, slot));
            }
        }
        nodes
    }

    fn step_active(&mut self, delta: isize) {
        let flat = self.flatten();
        if flat.is_empty() {
            self.active = None;
            return;
        }
        let next = match self.active.and_then(|node| flat.iter().position(|entry| *entry == node))
        {
            Some(position) => {
                let stepped = position as isize + delta;
                stepped.clamp(0, flat.len() as isize - 1) as usize
            }
            None => 0,
        };
        self.active = Some(flat[next]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn committed_rules(builder: &FilterBuilder) -> Vec<Vec<(String, bool)>> {
        builder
            .commit()
            .unwrap()
            .rules()
            .iter()
            .map(|rule| {
                rule.literals
                    .iter()
                    .map(|literal| (literal.tag.clone(), literal.required))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_build_two_rules() {
        let mut builder = FilterBuilder::new();
        builder.add_rule();
        builder.set_literal("rock", false);
        builder.add_literal();
        builder.set_literal("live", true);
        builder.add_rule();
        builder.set_literal("jazz", false);

        assert_eq!(
            committed_rules(&builder),
            vec![
                vec![("rock".to_string(), true), ("live".to_string(), false)],
                vec![("jazz".to_string(), true)],
            ]
        );
    }

    #[test]
    fn test_commit_drops_empty_slots_and_empty_rules() {
        let mut builder = FilterBuilder::new();
        builder.add_rule();
        builder.set_literal("rock", false);
        builder.add_literal(); // left unset
        builder.add_rule(); // whole rule left unset

        let rules = committed_rules(&builder);
        assert_eq!(rules, vec![vec![("rock".to_string(), true)]]);
    }

    #[test]
    fn test_deleting_the_last_literal_removes_the_rule() {
        let mut builder = FilterBuilder::new();
        builder.add_rule();
        builder.set_literal("rock", false);
        builder.delete();
        assert!(committed_rules(&builder).is_empty());
        assert_eq!(builder.summary(), "");
    }

    #[test]
    fn test_negate_flips_the_active_literal() {
        let mut builder = FilterBuilder::new();
        builder.add_rule();
        builder.set_literal("rock", false);
        builder.negate();
        assert_eq!(
            committed_rules(&builder),
            vec![vec![("rock".to_string(), false)]]
        );
        assert_eq!(builder.summary(), "NOT \"rock\"");
    }

    #[test]
    fn test_summary_joins_with_and_or() {
        let mut builder = FilterBuilder::new();
        builder.add_rule();
        builder.set_literal("rock", false);
        builder.add_literal();
        builder.set_literal("live", true);
        builder.add_rule();
        builder.set_literal("jazz", false);
        assert_eq!(builder.summary(), "\"rock\" AND NOT \"live\" OR \"jazz\"");
    }

    #[test]
    fn test_navigation_stays_in_bounds() {
        let mut builder = FilterBuilder::new();
        builder.move_down(); // empty tree: nothing to activate
        builder.add_rule();
        builder.set_literal("a", false);
        builder.move_up();
        builder.move_up(); // clamped at the first node
        builder.move_down();
        builder.set_literal("b", false);
        // The active slot was overwritten, not duplicated.
        assert_eq!(committed_rules(&builder), vec![vec![("b".to_string(), true)]]);
    }

    #[test]
    fn test_operations_without_an_active_node_are_noops() {
        let mut builder = FilterBuilder::new();
        builder.set_literal("a", false);
        builder.add_literal();
        builder.negate();
        builder.delete();
        assert!(committed_rules(&builder).is_empty());
    }

    #[test]
    fn test_roundtrip_through_an_existing_filter() {
        let mut builder = FilterBuilder::new();
        builder.set_pattern("^A");
        builder.set_strict(false);
        builder.add_rule();
        builder.set_literal("rock", true);
        let filter = builder.commit().unwrap();

        let reopened = FilterBuilder::from_filter(&filter);
        let recommitted = reopened.commit().unwrap();
        assert_eq!(recommitted.pattern(), "^A");
        assert!(!recommitted.is_strict());
        assert_eq!(recommitted.rules(), filter.rules());
    }
}
