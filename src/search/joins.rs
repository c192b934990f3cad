//! Join inference: which tables each active filter drags into the query.
//!
//! The requirements are filter-dependent and transitive — one filter can
//! force several joins (a filter on agent name from an actions search needs
//! the commands table before agents can be reached). Each rule therefore
//! carries the full transitive closure for its filter, and closures combine
//! by union so every required join appears exactly once no matter how many
//! filters triggered it.

use crate::search::params::SearchParameters;

/// The entity type a search targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Actions,
    Commands,
    Agents,
    Investigators,
}

/// Set of tables to join beyond the entity's own table. The flag for the
/// entity's base table is never set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JoinSet {
    pub commands: bool,
    pub actions: bool,
    pub agents: bool,
    pub investigators: bool,
}

impl JoinSet {
    pub const NONE: Self =
        Self { commands: false, actions: false, agents: false, investigators: false };

    pub const ALL: Self =
        Self { commands: true, actions: true, agents: true, investigators: true };

    const fn union(self, other: Self) -> Self {
        Self {
            commands: self.commands || other.commands,
            actions: self.actions || other.actions,
            agents: self.agents || other.agents,
            investigators: self.investigators || other.investigators,
        }
    }
}

/// One filter that can force joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filter {
    ActionId,
    ActionName,
    ThreatFamily,
    CommandId,
    AgentId,
    AgentName,
    InvestigatorId,
    InvestigatorName,
}

impl Filter {
    fn is_active(self, p: &SearchParameters) -> bool {
        match self {
            Filter::ActionId => p.action_id_filter().is_some(),
            Filter::ActionName => p.action_name_filter().is_some(),
            Filter::ThreatFamily => p.threat_family_filter().is_some(),
            Filter::CommandId => p.command_id_filter().is_some(),
            Filter::AgentId => p.agent_id_filter().is_some(),
            Filter::AgentName => p.agent_name_filter().is_some(),
            Filter::InvestigatorId => p.investigator_id_filter().is_some(),
            Filter::InvestigatorName => p.investigator_name_filter().is_some(),
        }
    }
}

struct Rule {
    filter: Filter,
    joins: JoinSet,
}

const fn rule(filter: Filter, joins: JoinSet) -> Rule {
    Rule { filter, joins }
}

// Single-flag sets, composed with `union` to spell out each rule's closure.
const COMMANDS: JoinSet = JoinSet { commands: true, actions: false, agents: false, investigators: false };
const ACTIONS: JoinSet = JoinSet { commands: false, actions: true, agents: false, investigators: false };
const AGENTS: JoinSet = JoinSet { commands: false, actions: false, agents: true, investigators: false };
const INVESTIGATORS: JoinSet =
    JoinSet { commands: false, actions: false, agents: false, investigators: true };

/// Actions search: agent filters reach agents through commands; investigator
/// filters go through signatures directly.
const ACTIONS_RULES: &[Rule] = &[
    rule(Filter::AgentId, COMMANDS.union(AGENTS)),
    rule(Filter::AgentName, COMMANDS.union(AGENTS)),
    rule(Filter::CommandId, COMMANDS),
    rule(Filter::InvestigatorId, INVESTIGATORS),
    rule(Filter::InvestigatorName, INVESTIGATORS),
];

/// Agents search: action filters reach actions through commands; investigator
/// filters additionally need actions before signatures can be reached.
const AGENTS_RULES: &[Rule] = &[
    rule(Filter::ActionId, COMMANDS.union(ACTIONS)),
    rule(Filter::ActionName, COMMANDS.union(ACTIONS)),
    rule(Filter::ThreatFamily, COMMANDS.union(ACTIONS)),
    rule(Filter::InvestigatorId, COMMANDS.union(ACTIONS).union(INVESTIGATORS)),
    rule(Filter::InvestigatorName, COMMANDS.union(ACTIONS).union(INVESTIGATORS)),
    rule(Filter::CommandId, COMMANDS),
];

/// Investigators search: everything hangs off signatures → actions; command
/// and agent filters extend the chain further.
const INVESTIGATORS_RULES: &[Rule] = &[
    rule(Filter::ActionId, ACTIONS),
    rule(Filter::ActionName, ACTIONS),
    rule(Filter::ThreatFamily, ACTIONS),
    rule(Filter::CommandId, COMMANDS.union(ACTIONS)),
    rule(Filter::AgentId, COMMANDS.union(ACTIONS).union(AGENTS)),
    rule(Filter::AgentName, COMMANDS.union(ACTIONS).union(AGENTS)),
];

/// Computes the joins the active filters require for one entity search.
///
/// Commands searches join everything unconditionally: every command row is
/// always enriched with its action, agent, and signer context.
pub fn required(entity: Entity, p: &SearchParameters) -> JoinSet {
    let rules = match entity {
        Entity::Actions => ACTIONS_RULES,
        Entity::Agents => AGENTS_RULES,
        Entity::Investigators => INVESTIGATORS_RULES,
        Entity::Commands => return JoinSet::ALL,
    };
    rules
        .iter()
        .filter(|r| r.filter.is_active(p))
        .fold(JoinSet::NONE, |acc, r| acc.union(r.joins))
}

const SIGNATURES_FROM_ACTIONS: &str = "INNER JOIN signatures ON ( actions.id = signatures.actionid ) \
     INNER JOIN investigators ON ( signatures.investigatorid = investigators.id ) ";

/// Renders the join clause for an entity in its fixed join order.
pub fn clause(entity: Entity, set: JoinSet) -> String {
    let mut sql = String::new();
    match entity {
        Entity::Actions => {
            if set.commands {
                sql.push_str("INNER JOIN commands ON ( commands.actionid = actions.id ) ");
            }
            if set.agents {
                sql.push_str("INNER JOIN agents ON ( commands.agentid = agents.id ) ");
            }
            if set.investigators {
                sql.push_str(SIGNATURES_FROM_ACTIONS);
            }
        },
        Entity::Commands => {
            sql.push_str("INNER JOIN actions ON ( commands.actionid = actions.id ) ");
            sql.push_str(SIGNATURES_FROM_ACTIONS);
            sql.push_str("INNER JOIN agents ON ( commands.agentid = agents.id ) ");
        },
        Entity::Agents => {
            if set.commands {
                sql.push_str("INNER JOIN commands ON ( commands.agentid = agents.id ) ");
            }
            if set.actions {
                sql.push_str("INNER JOIN actions ON ( commands.actionid = actions.id ) ");
            }
            if set.investigators {
                sql.push_str(SIGNATURES_FROM_ACTIONS);
            }
        },
        Entity::Investigators => {
            if set.actions {
                sql.push_str(
                    "INNER JOIN signatures ON ( signatures.investigatorid = investigators.id ) \
                     INNER JOIN actions ON ( actions.id = signatures.actionid ) ",
                );
            }
            if set.commands {
                sql.push_str("INNER JOIN commands ON ( commands.actionid = actions.id ) ");
            }
            if set.agents {
                sql.push_str("INNER JOIN agents ON ( commands.agentid = agents.id ) ");
            }
        },
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SearchParameters {
        SearchParameters::default()
    }

    #[test]
    fn no_filters_need_no_joins() {
        for entity in [Entity::Actions, Entity::Agents, Entity::Investigators] {
            assert_eq!(required(entity, &params()), JoinSet::NONE);
        }
    }

    #[test]
    fn commands_search_always_requires_everything() {
        assert_eq!(required(Entity::Commands, &params()), JoinSet::ALL);
    }

    #[test]
    fn actions_search_agent_filter_forces_commands_transitively() {
        let mut p = params();
        p.agent_name = "web%".to_string();
        let set = required(Entity::Actions, &p);
        assert_eq!(set, JoinSet { commands: true, agents: true, ..JoinSet::NONE });
    }

    #[test]
    fn actions_search_investigator_filter_needs_only_signatures() {
        let mut p = params();
        p.investigator_id = "3".to_string();
        let set = required(Entity::Actions, &p);
        assert_eq!(set, JoinSet { investigators: true, ..JoinSet::NONE });
    }

    #[test]
    fn agents_search_action_name_joins_commands_and_actions() {
        let mut p = params();
        p.action_name = "phish%".to_string();
        let set = required(Entity::Agents, &p);
        assert_eq!(set, JoinSet { commands: true, actions: true, ..JoinSet::NONE });
    }

    #[test]
    fn agents_search_investigator_filter_extends_the_whole_chain() {
        let mut p = params();
        p.investigator_name = "sam%".to_string();
        let set = required(Entity::Agents, &p);
        assert_eq!(
            set,
            JoinSet { commands: true, actions: true, investigators: true, ..JoinSet::NONE }
        );
    }

    #[test]
    fn investigators_search_agent_filter_forces_full_chain() {
        let mut p = params();
        p.agent_id = "8".to_string();
        let set = required(Entity::Investigators, &p);
        assert_eq!(set, JoinSet { commands: true, actions: true, agents: true, ..JoinSet::NONE });
    }

    #[test]
    fn investigators_search_command_filter_needs_actions_too() {
        let mut p = params();
        p.command_id = "77".to_string();
        let set = required(Entity::Investigators, &p);
        assert_eq!(set, JoinSet { commands: true, actions: true, ..JoinSet::NONE });
    }

    #[test]
    fn overlapping_filters_deduplicate_by_flag() {
        let mut p = params();
        p.agent_id = "8".to_string();
        p.agent_name = "web%".to_string();
        p.command_id = "77".to_string();
        let sql = clause(Entity::Actions, required(Entity::Actions, &p));
        assert_eq!(sql.matches("INNER JOIN commands").count(), 1);
        assert_eq!(sql.matches("INNER JOIN agents").count(), 1);
    }

    #[test]
    fn actions_join_order_is_commands_agents_signatures() {
        let set = JoinSet::ALL;
        let sql = clause(Entity::Actions, set);
        let commands = sql.find("INNER JOIN commands").unwrap();
        let agents = sql.find("INNER JOIN agents").unwrap();
        let signatures = sql.find("INNER JOIN signatures").unwrap();
        assert!(commands < agents && agents < signatures);
    }

    #[test]
    fn investigators_join_order_starts_from_signatures() {
        let sql = clause(Entity::Investigators, JoinSet::ALL);
        let signatures = sql.find("INNER JOIN signatures").unwrap();
        let actions = sql.find("INNER JOIN actions").unwrap();
        let commands = sql.find("INNER JOIN commands").unwrap();
        let agents = sql.find("INNER JOIN agents").unwrap();
        assert!(signatures < actions && actions < commands && commands < agents);
    }
}
