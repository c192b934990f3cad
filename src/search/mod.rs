//! Filter-driven search over actions, commands, agents, and investigators.
//!
//! Each search call derives identifier ranges from the filters, infers the
//! set of tables the filters require, assembles one parameterized query, and
//! hydrates every returned row (including embedded JSON sub-documents and
//! per-action enrichment lookups). All work within a call is sequential.

pub mod builder;
pub mod hydrate;
pub mod joins;
pub mod params;
pub mod ranges;

use crate::core::types::{Action, Agent, Command, Investigator, status};
use crate::database::{ActionEnrichment, Database, Error, PgEnrichment};
use builder::{Bind, QueryBuilder};
use joins::Entity;
use params::SearchParameters;
use ranges::IdRanges;
use sqlx::postgres::PgRow;
use sqlx::{Executor, Statement};
use std::sync::Arc;

/// Search service over the relational store.
///
/// Generic over the enrichment lookups so tests (or a future batched
/// implementation) can substitute them.
pub struct SearchService<E = PgEnrichment> {
    db: Arc<Database>,
    enrich: E,
}

impl SearchService<PgEnrichment> {
    pub fn new(db: Arc<Database>) -> Self {
        let enrich = PgEnrichment::new(db.clone());
        Self { db, enrich }
    }
}

impl<E: ActionEnrichment> SearchService<E> {
    pub fn with_enrichment(db: Arc<Database>, enrich: E) -> Self {
        Self { db, enrich }
    }

    /// Returns the actions matching the search parameters
    pub async fn search_actions(&self, p: &SearchParameters) -> Result<Vec<Action>, Error> {
        tracing::debug!("Search: actions with filters '{}'", p);
        let (query, binds) = build_actions_query(p)?;
        let rows = self.fetch_rows(query, binds).await?;

        let mut actions = Vec::with_capacity(rows.len());
        for row in rows {
            let mut action = hydrate::scan_action(&row)?;
            action.counters = self.enrich.action_counters(action.id).await?;
            action.investigators = self.enrich.investigators_for_action(action.id).await?;
            actions.push(action);
        }
        Ok(actions)
    }

    /// Returns the commands matching the search parameters. When
    /// `found_anything` is true, results are restricted to successful
    /// commands whose result entries report the requested found-anything
    /// value.
    pub async fn search_commands(
        &self,
        p: &SearchParameters,
        found_anything: bool,
    ) -> Result<Vec<Command>, Error> {
        tracing::debug!("Search: commands with filters '{}'", p);
        let (query, binds) = build_commands_query(p, found_anything)?;
        let rows = self.fetch_rows(query, binds).await?;

        let mut commands = Vec::with_capacity(rows.len());
        for row in rows {
            let mut command = hydrate::scan_command(&row)?;
            command.action.counters = self.enrich.action_counters(command.action.id).await?;
            command.action.investigators =
                self.enrich.investigators_for_action(command.action.id).await?;
            commands.push(command);
        }
        Ok(commands)
    }

    /// Returns the agents matching the search parameters
    pub async fn search_agents(&self, p: &SearchParameters) -> Result<Vec<Agent>, Error> {
        tracing::debug!("Search: agents with filters '{}'", p);
        let (query, binds) = build_agents_query(p)?;
        let rows = self.fetch_rows(query, binds).await?;

        let mut agents = Vec::with_capacity(rows.len());
        for row in rows {
            agents.push(hydrate::scan_agent(&row)?);
        }
        Ok(agents)
    }

    /// Returns the investigators matching the search parameters
    pub async fn search_investigators(
        &self,
        p: &SearchParameters,
    ) -> Result<Vec<Investigator>, Error> {
        tracing::debug!("Search: investigators with filters '{}'", p);
        let (query, binds) = build_investigators_query(p)?;
        let rows = self.fetch_rows(query, binds).await?;

        let mut investigators = Vec::with_capacity(rows.len());
        for row in rows {
            investigators.push(hydrate::scan_investigator(&row)?);
        }
        Ok(investigators)
    }

    /// Prepare and execute one search query. Preparation failures carry the
    /// query text; execution failures do not.
    async fn fetch_rows(&self, query: String, binds: Vec<Bind>) -> Result<Vec<PgRow>, Error> {
        let mut conn = self.db.pool.acquire().await.map_err(Error::Acquire)?;
        let stmt = (&mut *conn)
            .prepare(query.as_str())
            .await
            .map_err(|e| Error::Prepare { query: query.clone(), source: e })?;

        let mut prepared = stmt.query();
        for bind in &binds {
            prepared = bind.apply(prepared);
        }
        prepared.fetch_all(&mut *conn).await.map_err(Error::Query)
    }
}

/// Assembles the actions search query.
fn build_actions_query(p: &SearchParameters) -> Result<(String, Vec<Bind>), Error> {
    let ids = IdRanges::from_params(p)?;
    let mut qb = QueryBuilder::new();

    if let Some(before) = p.before_bound() {
        qb.at_most("actions.expireafter", before);
    }
    if let Some(after) = p.after_bound() {
        qb.at_least("actions.validfrom", after);
    }
    if let Some(pattern) = p.status_filter() {
        qb.pattern("actions.status", pattern);
    }
    if p.action_id_filter().is_some() {
        qb.range("actions.id", ids.action);
    }
    if let Some(pattern) = p.action_name_filter() {
        qb.pattern("actions.name", pattern);
    }
    if p.investigator_id_filter().is_some() {
        qb.range("investigators.id", ids.investigator);
    }
    if let Some(pattern) = p.investigator_name_filter() {
        qb.pattern("investigators.name", pattern);
    }
    if p.agent_id_filter().is_some() {
        qb.range("agents.id", ids.agent);
    }
    if let Some(pattern) = p.agent_name_filter() {
        qb.pattern("agents.name", pattern);
    }
    if p.command_id_filter().is_some() {
        qb.range("commands.id", ids.command);
    }
    if let Some(pattern) = p.threat_family_filter() {
        qb.pattern("actions.threat#>>'{family}'", pattern);
    }

    let join = joins::clause(Entity::Actions, joins::required(Entity::Actions, p));
    let query = qb.render(
        "actions.id, actions.name, actions.target, actions.description, actions.threat, \
         actions.operations, actions.validfrom, actions.expireafter, actions.starttime, \
         actions.finishtime, actions.lastupdatetime, actions.status, actions.pgpsignatures, \
         actions.syntaxversion",
        "actions",
        &join,
        "actions.id",
        "actions.validfrom DESC",
        p.limit,
        p.offset,
    );
    Ok((query, qb.into_binds()))
}

/// Assembles the commands search query. Joins are unconditional: every
/// command row is enriched with its action, agent, and signer context.
fn build_commands_query(
    p: &SearchParameters,
    found_anything: bool,
) -> Result<(String, Vec<Bind>), Error> {
    let ids = IdRanges::from_params(p)?;
    let mut qb = QueryBuilder::new();

    if let Some(before) = p.before_bound() {
        qb.at_most("commands.starttime", before);
    }
    if let Some(after) = p.after_bound() {
        qb.at_least("commands.starttime", after);
    }
    if p.command_id_filter().is_some() {
        qb.range("commands.id", ids.command);
    }
    if let Some(pattern) = p.status_filter() {
        qb.pattern("commands.status", pattern);
    }
    if p.action_id_filter().is_some() {
        qb.range("actions.id", ids.action);
    }
    if let Some(pattern) = p.action_name_filter() {
        qb.pattern("actions.name", pattern);
    }
    if p.investigator_id_filter().is_some() {
        qb.range("investigators.id", ids.investigator);
    }
    if let Some(pattern) = p.investigator_name_filter() {
        qb.pattern("investigators.name", pattern);
    }
    if p.agent_id_filter().is_some() {
        qb.range("agents.id", ids.agent);
    }
    if let Some(pattern) = p.agent_name_filter() {
        qb.pattern("agents.name", pattern);
    }
    if found_anything {
        // Correlated existence check over the decomposed result entries of
        // the same table. The action range defaults to the full id space
        // when no action filter is set.
        let status_slot = qb.push_bind(Bind::Text(status::SUCCESS.to_string()));
        let min_slot = qb.push_bind(Bind::Num(ids.action.min));
        let max_slot = qb.push_bind(Bind::Num(ids.action.max));
        let found_slot =
            qb.push_bind(Bind::Text(if p.found_anything { "true" } else { "false" }.to_string()));
        qb.push_clause(format!(
            "commands.status = ${status_slot} AND commands.id IN ( \
             SELECT commands.id FROM commands, actions, \
             json_array_elements(commands.results) AS r \
             WHERE commands.actionid = actions.id \
             AND actions.id >= ${min_slot} AND actions.id <= ${max_slot} \
             AND r#>>'{{foundanything}}' = ${found_slot} )"
        ));
    }
    if let Some(pattern) = p.threat_family_filter() {
        qb.pattern("actions.threat#>>'{family}'", pattern);
    }

    let join = joins::clause(Entity::Commands, joins::required(Entity::Commands, p));
    let query = qb.render(
        "commands.id, commands.status, commands.results, commands.starttime, \
         commands.finishtime, actions.id, actions.name, actions.target, actions.description, \
         actions.threat, actions.operations, actions.validfrom, actions.expireafter, \
         actions.pgpsignatures, actions.syntaxversion, agents.id, agents.name, agents.version, \
         agents.tags, agents.environment",
        "commands",
        &join,
        "commands.id, actions.id, agents.id",
        "commands.starttime DESC",
        p.limit,
        p.offset,
    );
    Ok((query, qb.into_binds()))
}

/// Assembles the agents search query.
fn build_agents_query(p: &SearchParameters) -> Result<(String, Vec<Bind>), Error> {
    let ids = IdRanges::from_params(p)?;
    let mut qb = QueryBuilder::new();

    if let Some(before) = p.before_bound() {
        qb.at_most("agents.heartbeattime", before);
    }
    if let Some(after) = p.after_bound() {
        qb.at_least("agents.heartbeattime", after);
    }
    if p.agent_id_filter().is_some() {
        qb.range("agents.id", ids.agent);
    }
    if let Some(pattern) = p.agent_name_filter() {
        qb.pattern("agents.name", pattern);
    }
    if let Some(pattern) = p.status_filter() {
        qb.pattern("agents.status", pattern);
    }
    if p.action_id_filter().is_some() {
        qb.range("actions.id", ids.action);
    }
    if let Some(pattern) = p.action_name_filter() {
        qb.pattern("actions.name", pattern);
    }
    if let Some(pattern) = p.threat_family_filter() {
        qb.pattern("actions.threat#>>'{family}'", pattern);
    }
    if p.investigator_id_filter().is_some() {
        qb.range("investigators.id", ids.investigator);
    }
    if let Some(pattern) = p.investigator_name_filter() {
        qb.pattern("investigators.name", pattern);
    }
    if p.command_id_filter().is_some() {
        qb.range("commands.id", ids.command);
    }

    let join = joins::clause(Entity::Agents, joins::required(Entity::Agents, p));
    let query = qb.render(
        "agents.id, agents.name, agents.queueloc, agents.mode, agents.version, agents.pid, \
         agents.starttime, agents.destructiontime, agents.heartbeattime, agents.status",
        "agents",
        &join,
        "agents.id",
        "agents.heartbeattime DESC",
        p.limit,
        p.offset,
    );
    Ok((query, qb.into_binds()))
}

/// Assembles the investigators search query.
fn build_investigators_query(p: &SearchParameters) -> Result<(String, Vec<Bind>), Error> {
    let ids = IdRanges::from_params(p)?;
    let mut qb = QueryBuilder::new();

    if let Some(before) = p.before_bound() {
        qb.at_most("investigators.lastmodified", before);
    }
    if let Some(after) = p.after_bound() {
        qb.at_least("investigators.lastmodified", after);
    }
    if p.investigator_id_filter().is_some() {
        qb.range("investigators.id", ids.investigator);
    }
    if let Some(pattern) = p.investigator_name_filter() {
        qb.pattern("investigators.name", pattern);
    }
    if let Some(pattern) = p.status_filter() {
        qb.pattern("investigators.status", pattern);
    }
    if p.action_id_filter().is_some() {
        qb.range("actions.id", ids.action);
    }
    if let Some(pattern) = p.action_name_filter() {
        qb.pattern("actions.name", pattern);
    }
    if let Some(pattern) = p.threat_family_filter() {
        qb.pattern("actions.threat#>>'{family}'", pattern);
    }
    if p.command_id_filter().is_some() {
        qb.range("commands.id", ids.command);
    }
    if p.agent_id_filter().is_some() {
        qb.range("agents.id", ids.agent);
    }
    if let Some(pattern) = p.agent_name_filter() {
        qb.pattern("agents.name", pattern);
    }

    let join = joins::clause(Entity::Investigators, joins::required(Entity::Investigators, p));
    let query = qb.render(
        "investigators.id, investigators.name, investigators.pgpfingerprint, \
         investigators.status, investigators.createdat, investigators.lastmodified",
        "investigators",
        &join,
        "investigators.id",
        "investigators.id ASC",
        p.limit,
        p.offset,
    );
    Ok((query, qb.into_binds()))
}
