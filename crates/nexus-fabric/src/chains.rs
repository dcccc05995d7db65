//! # Chain State Machine
//!
//! Validates and applies every change to a chain. A transition is a
//! read-validate-write cycle:
//!
//! 1. load the chain and check the caller can see it,
//! 2. check the caller's role for the chain type,
//! 3. pin `type` and `account_id` to the stored values,
//! 4. validate fields and embed-key rules,
//! 5. consult the transition table,
//! 6. write with `WHERE state = <loaded state>`.
//!
//! Step 6 is the only mutual exclusion for state. If another worker changed
//! the state between steps 1 and 6 the write affects nothing and the caller
//! gets [`NexusError::Conflict`]. Embed-key uniqueness is checked in step 4
//! for a readable error and enforced again by the gateway inside the write.
//! Nothing here retries.
//!
//! After a successful write that changed the state, the [`WorkDispatcher`]
//! hears about it exactly once.

use std::sync::Arc;

use nexus_core::{
    to_embed_key, AccessControl, AccountId, ChainId, NexusError, NexusResult, UserRole,
};
use nexus_state::{
    BindingTarget, Chain, ChainBinding, ChainFields, ChainState, ChainType, LifecycleState,
};

use crate::clock::Clock;
use crate::config::FabricationConfig;
use crate::dispatch::{MessageLevel, Notifier, WorkDispatcher};
use crate::gateway::PersistenceGateway;

/// Applies validated chain changes through the persistence gateway.
pub struct ChainStateMachine {
    gateway: Arc<dyn PersistenceGateway>,
    dispatcher: Arc<dyn WorkDispatcher>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: FabricationConfig,
}

impl ChainStateMachine {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        dispatcher: Arc<dyn WorkDispatcher>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: FabricationConfig,
    ) -> Self {
        Self {
            gateway,
            dispatcher,
            notifier,
            clock,
            config,
        }
    }

    // ─── Create ──────────────────────────────────────────────────────

    /// Create a chain in `Draft`.
    ///
    /// Preview chains get no embed key and a window ending now that spans
    /// `preview_length_max_seconds`.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the caller cannot access the account.
    /// - `Authorization` without Engineer (Production) or Artist (Preview).
    /// - `Validation` for missing fields.
    /// - `BusinessRule` when another live chain holds the embed key.
    pub fn create(
        &self,
        access: &dyn AccessControl,
        mut fields: ChainFields,
    ) -> NexusResult<Chain> {
        let account_id = fields
            .account_id
            .ok_or_else(|| NexusError::Validation("Account ID is required.".into()))?;
        require_account(access, account_id)?;
        match fields.chain_type {
            ChainType::Production => require_role(access, &[UserRole::Engineer])?,
            ChainType::Preview => require_role(access, &[UserRole::Artist])?,
        }

        fields.state = ChainState::Draft;
        if fields.chain_type == ChainType::Preview {
            let now = self.clock.now();
            fields.embed_key = None;
            fields.start_at = Some(now.minus_seconds(self.config.preview_length_max_seconds)?);
            fields.stop_at = Some(now);
        }
        fields.normalize_embed_key();
        fields.validate()?;
        self.require_embed_key_available(fields.embed_key.as_deref(), None)?;

        let chain = fields.into_chain(ChainId::new())?;
        self.gateway.insert_chain(&chain)?;
        tracing::info!(
            chain_id = %chain.id,
            chain_type = %chain.chain_type,
            embed_key = chain.embed_key.as_deref().unwrap_or(""),
            "created chain"
        );
        Ok(chain)
    }

    // ─── Read ────────────────────────────────────────────────────────

    /// One chain the caller can see.
    pub fn read_one(&self, access: &dyn AccessControl, id: ChainId) -> NexusResult<Chain> {
        let chain = self.load(id)?;
        require_account(access, chain.account_id).map_err(|_| chain_not_found(id))?;
        Ok(chain)
    }

    /// Public lookup by embed key. No access check.
    pub fn read_one_by_embed_key(&self, embed_key: &str) -> NexusResult<Chain> {
        let key = to_embed_key(embed_key)
            .ok_or_else(|| NexusError::NotFound(format!("Chain with embed key {embed_key:?}")))?;
        self.gateway
            .read_chain_by_embed_key(&key)?
            .ok_or_else(|| NexusError::NotFound(format!("Chain with embed key {key:?}")))
    }

    /// Non-Erase chains of the given accounts.
    pub fn read_many(
        &self,
        access: &dyn AccessControl,
        account_ids: &[AccountId],
    ) -> NexusResult<Vec<Chain>> {
        for account_id in account_ids {
            require_account(access, *account_id)?;
        }
        Ok(self
            .gateway
            .read_chains_for_accounts(account_ids)?
            .into_iter()
            .filter(|c| c.state != ChainState::Erase)
            .collect())
    }

    /// Every chain in `state`, across accounts. Admin or Engineer only.
    pub fn read_all_in_state(
        &self,
        access: &dyn AccessControl,
        state: ChainState,
    ) -> NexusResult<Vec<Chain>> {
        require_role(access, &[UserRole::Admin, UserRole::Engineer])?;
        self.gateway.read_chains_in_state(state)
    }

    // ─── Transition ──────────────────────────────────────────────────

    /// Validate and apply `fields` to chain `id`.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Authorization`, `Validation`, `BusinessRule`,
    /// `IllegalTransition`, or `Conflict` when the stored state moved since
    /// it was read.
    pub fn transition(
        &self,
        access: &dyn AccessControl,
        id: ChainId,
        fields: ChainFields,
    ) -> NexusResult<Chain> {
        let existing = self.read_one(access, id)?;
        self.apply(access, existing, fields)
    }

    /// Move chain `id` to `state`, keeping every other field.
    pub fn update_state(
        &self,
        access: &dyn AccessControl,
        id: ChainId,
        state: ChainState,
    ) -> NexusResult<Chain> {
        let existing = self.read_one(access, id)?;
        let fields = existing.to_fields().with_state(state);
        self.apply(access, existing, fields)
    }

    /// Validate `fields` against `existing` and write them on the condition
    /// that the stored state is still `existing.state`.
    fn apply(
        &self,
        access: &dyn AccessControl,
        existing: Chain,
        mut fields: ChainFields,
    ) -> NexusResult<Chain> {
        let id = existing.id;
        match existing.chain_type {
            ChainType::Production => require_role(access, &[UserRole::Engineer])?,
            ChainType::Preview => require_role(access, &[UserRole::Engineer, UserRole::Artist])?,
        }

        fields.chain_type = existing.chain_type;
        fields.account_id = Some(existing.account_id);
        fields.normalize_embed_key();
        fields.validate()?;
        match existing.chain_type {
            ChainType::Production => {
                self.require_embed_key_available(fields.embed_key.as_deref(), Some(id))?
            }
            ChainType::Preview => fields.embed_key = None,
        }

        let from = existing.state;
        let to = fields.state;
        from.require_transition(to)?;

        if from == ChainState::Draft
            && to == ChainState::Ready
            && self.gateway.read_bindings(id)?.is_empty()
        {
            return Err(unbound());
        }
        if to == ChainState::Erase {
            fields.embed_key = None;
        }
        if fields.start_at != Some(existing.start_at) && self.gateway.count_segments(id)? > 0 {
            return Err(NexusError::BusinessRule(
                "cannot change chain start time after it has segments".into(),
            ));
        }

        let updated = fields.into_chain(id)?;
        if !self.gateway.update_chain_if_state(&updated, from)? {
            tracing::debug!(chain_id = %id, from = %from, to = %to, "conditional chain write lost");
            return Err(NexusError::no_records_updated());
        }

        if from != to {
            tracing::info!(chain_id = %id, from = %from, to = %to, "chain state changed");
            metrics::counter!("nexus_chain_transitions_total", "to" => to.name()).increment(1);
            self.dispatch(from, &updated);
        }
        Ok(updated)
    }

    /// Schedule chain `id` for deletion.
    pub fn erase(&self, access: &dyn AccessControl, id: ChainId) -> NexusResult<Chain> {
        self.update_state(access, id, ChainState::Erase)
    }

    /// Delete a chain that has no segments, along with its bindings.
    pub fn destroy(&self, access: &dyn AccessControl, id: ChainId) -> NexusResult<()> {
        let chain = self.read_one(access, id)?;
        if self.gateway.count_segments(id)? > 0 {
            return Err(NexusError::BusinessRule("Found Segment in Chain".into()));
        }
        let bindings = self.gateway.delete_bindings(id)?;
        self.gateway.delete_chain(id)?;
        tracing::info!(chain_id = %chain.id, bindings, "destroyed chain");
        Ok(())
    }

    // ─── Bindings ────────────────────────────────────────────────────

    /// Bind a content source to a `Draft` chain.
    pub fn bind(
        &self,
        access: &dyn AccessControl,
        chain_id: ChainId,
        target: BindingTarget,
    ) -> NexusResult<ChainBinding> {
        let chain = self.read_one(access, chain_id)?;
        if chain.state != ChainState::Draft {
            return Err(NexusError::BusinessRule(format!(
                "cannot bind content to a {} chain",
                chain.state
            )));
        }
        let binding = ChainBinding::new(chain_id, target);
        self.gateway.insert_binding(&binding)?;
        tracing::debug!(chain_id = %chain_id, target = %target, "bound chain");
        Ok(binding)
    }

    pub fn read_bindings(
        &self,
        access: &dyn AccessControl,
        chain_id: ChainId,
    ) -> NexusResult<Vec<ChainBinding>> {
        self.read_one(access, chain_id)?;
        self.gateway.read_bindings(chain_id)
    }

    // ─── Revival ─────────────────────────────────────────────────────

    /// Replace a stalled Production chain with a fresh one.
    ///
    /// The prior chain goes to `Failed` and gives up its embed key. The new
    /// chain copies the prior's account, name, config, stop time and
    /// bindings, takes over the embed key, starts now, and is advanced to
    /// `Fabricate`.
    ///
    /// # Errors
    ///
    /// `BusinessRule` unless the chain is a bound Production chain in
    /// `Fabricate`; nothing is written in that case. `Conflict` when the
    /// chain left `Fabricate` after it was read, which is how a second
    /// reviver of the same chain loses.
    pub fn revive(
        &self,
        access: &dyn AccessControl,
        id: ChainId,
        reason: &str,
    ) -> NexusResult<Chain> {
        let prior = self.read_one(access, id)?;
        if prior.state != ChainState::Fabricate {
            return Err(NexusError::BusinessRule(
                "Only a Fabricate-state Chain can be revived.".into(),
            ));
        }
        if prior.chain_type != ChainType::Production {
            return Err(NexusError::BusinessRule(
                "Only a Production-type Chain can be revived.".into(),
            ));
        }

        let bindings = self.gateway.read_bindings(id)?;
        if bindings.is_empty() {
            return Err(unbound());
        }

        let embed_key = prior.embed_key.clone();
        let mut failed = prior.to_fields().with_state(ChainState::Failed);
        failed.embed_key = None;
        self.apply(access, prior.clone(), failed)?;

        let mut fields = prior.to_fields().with_state(ChainState::Draft);
        fields.start_at = Some(self.clock.now());
        fields.embed_key = embed_key;
        let created = self.create(access, fields)?;

        for binding in &bindings {
            self.gateway.insert_binding(&binding.clone_onto(created.id))?;
        }
        self.update_state(access, created.id, ChainState::Ready)?;
        let revived = self.update_state(access, created.id, ChainState::Fabricate)?;

        tracing::warn!(prior_chain_id = %id, chain_id = %revived.id, reason, "revived chain");
        metrics::counter!("nexus_chains_revived_total").increment(1);
        self.notifier.publish(
            MessageLevel::Warning,
            &format!("Revived Chain {} from prior Chain {} because {}", revived.id, id, reason),
        );
        Ok(revived)
    }

    // ─── Internals ───────────────────────────────────────────────────

    fn load(&self, id: ChainId) -> NexusResult<Chain> {
        self.gateway.read_chain(id)?.ok_or_else(|| chain_not_found(id))
    }

    fn require_embed_key_available(
        &self,
        embed_key: Option<&str>,
        own_id: Option<ChainId>,
    ) -> NexusResult<()> {
        let Some(key) = embed_key else {
            return Ok(());
        };
        match self.gateway.read_chain_by_embed_key(key)? {
            Some(holder) if Some(holder.id) != own_id => Err(NexusError::embed_key_taken()),
            _ => Ok(()),
        }
    }

    fn dispatch(&self, from: ChainState, chain: &Chain) {
        match (from, chain.state) {
            (_, ChainState::Fabricate) => self.dispatcher.start_chain_fabrication(chain),
            (ChainState::Fabricate, ChainState::Complete | ChainState::Failed) => {
                self.dispatcher.stop_chain_fabrication(chain)
            }
            (_, ChainState::Erase) => self.dispatcher.start_chain_erase(chain),
            _ => {}
        }
    }
}

fn unbound() -> NexusError {
    NexusError::BusinessRule(
        "Chain must be bound to at least one Library, Program, or Instrument".into(),
    )
}

fn chain_not_found(id: ChainId) -> NexusError {
    NexusError::NotFound(format!("{id}"))
}

fn require_account(access: &dyn AccessControl, account_id: AccountId) -> NexusResult<()> {
    if access.is_top_level() || access.has_account(&account_id) {
        Ok(())
    } else {
        Err(NexusError::NotFound(format!("{account_id}")))
    }
}

/// Top-level access, or any of `roles`.
pub(crate) fn require_role(access: &dyn AccessControl, roles: &[UserRole]) -> NexusResult<()> {
    if access.is_top_level() || access.is_allowed(roles) {
        Ok(())
    } else {
        let names: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        Err(NexusError::Authorization(format!(
            "requires one of: {}",
            names.join(", ")
        )))
    }
}

pub(crate) fn require_top_level(access: &dyn AccessControl) -> NexusResult<()> {
    if access.is_top_level() {
        Ok(())
    } else {
        Err(NexusError::Authorization("top-level access is required".into()))
    }
}

pub(crate) fn require_chain_account(access: &dyn AccessControl, chain: &Chain) -> NexusResult<()> {
    require_account(access, chain.account_id).map_err(|_| chain_not_found(chain.id))
}
