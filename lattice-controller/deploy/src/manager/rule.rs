use chrono::Utc;
use lattice_controller_core::{
    api::{
        ApiError, CreateRuleRequest, HttpMatch, RuleAction, RuleDetails, RulePriorityUpdate,
        RuleSummary, UpdateRuleRequest,
    },
    model::{RuleSpec, RuleStatus, MAX_RULE_PRIORITY, MIN_RULE_PRIORITY},
    tags::is_arn_managed,
    CloudConfig, Error, NetworkingApi, Result,
};
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, info, warn};

use crate::RemoteListener;

/// Manages listener rules.
///
/// Remote rules are matched to desired rules by the equivalence of their match conditions,
/// not by name, so that rules survive changes to the desired priority. A rule keeps its remote
/// priority until [`RuleManager::update_priorities`] moves it. Rules managed by someone else
/// are never updated or deleted.
#[derive(Clone)]
pub struct RuleManager {
    api: Arc<dyn NetworkingApi>,
    cloud: Arc<CloudConfig>,
}

/// Tracks which of the priorities `1..=99` are in use on a listener.
#[derive(Clone, Debug)]
pub struct PrioritySlots([bool; MAX_RULE_PRIORITY as usize + 1]);

impl RuleManager {
    pub fn new(api: Arc<dyn NetworkingApi>, cloud: Arc<CloudConfig>) -> Self {
        Self { api, cloud }
    }

    /// Ensures a rule with an equivalent match exists on the listener with the given action.
    ///
    /// An existing equivalent rule is updated in place when its action differs. Otherwise a
    /// new rule is created at the lowest free priority. An equivalent rule this controller does
    /// not manage is a conflict.
    pub async fn upsert(
        &self,
        spec: &RuleSpec,
        action: RuleAction,
        listener: &RemoteListener,
    ) -> Result<RuleStatus> {
        let desired_priority = spec.priority()?;
        let mut slots = PrioritySlots::default();
        let mut existing = None;
        for summary in self.list(listener).await? {
            slots.occupy(summary.priority);
            if existing.is_some() {
                continue;
            }
            let details = self
                .api
                .get_rule(&listener.service_id, &listener.id, &summary.id)
                .await?;
            if is_equivalent_match(&details.matcher, &spec.matcher) {
                existing = Some(details);
            }
        }

        if let Some(existing) = existing {
            if !is_arn_managed(&*self.api, &self.cloud, &existing.arn).await? {
                return Err(Error::conflict(format!(
                    "rule {} on listener {} is not managed by this controller",
                    existing.name, listener.id
                )));
            }
            let mut priority_update_needed = existing.priority != desired_priority;
            if !is_same_action(&existing.action, &action) {
                info!(rule = %spec.rule_id, id = %existing.id, "Updating rule");
                let update = UpdateRuleRequest {
                    service_id: listener.service_id.clone(),
                    listener_id: listener.id.clone(),
                    rule_id: existing.id.clone(),
                    matcher: Some(spec.matcher.clone()),
                    priority: None,
                    action: Some(action),
                };
                if let Err(error) = self.api.update_rule(update).await {
                    warn!(rule = %spec.rule_id, id = %existing.id, %error, "Failed to update rule");
                    priority_update_needed = true;
                }
            }
            return Ok(RuleStatus {
                arn: existing.arn,
                id: existing.id,
                name: existing.name,
                priority: existing.priority,
                priority_update_needed,
            });
        }

        let priority = slots.next_free().ok_or_else(|| {
            Error::retry(format!(
                "no free rule priority on listener {}",
                listener.id
            ))
        })?;
        let name = format!("k8s-{}-{}", Utc::now().timestamp(), spec.rule_id);
        info!(rule = %spec.rule_id, %name, %priority, "Creating rule");
        let created = self
            .api
            .create_rule(CreateRuleRequest {
                service_id: listener.service_id.clone(),
                listener_id: listener.id.clone(),
                name,
                priority,
                matcher: spec.matcher.clone(),
                action,
                tags: self.cloud.default_tags(),
            })
            .await?;
        Ok(RuleStatus {
            arn: created.arn,
            id: created.id,
            name: created.name,
            priority: created.priority,
            priority_update_needed: created.priority != desired_priority,
        })
    }

    /// Moves rules to their desired priorities in a single batch call.
    pub async fn update_priorities(
        &self,
        listener: &RemoteListener,
        updates: Vec<RulePriorityUpdate>,
    ) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        debug!(listener = %listener.id, updates = updates.len(), "Updating rule priorities");
        self.api
            .batch_update_rule_priorities(&listener.service_id, &listener.id, updates)
            .await?;
        Ok(())
    }

    /// Lists the non-default rules on a listener.
    pub async fn list(&self, listener: &RemoteListener) -> Result<Vec<RuleSummary>> {
        let rules = self
            .api
            .list_rules(&listener.service_id, &listener.id)
            .await?;
        Ok(rules.into_iter().filter(|r| !r.is_default).collect())
    }

    pub async fn get(&self, rule_id: &str, listener: &RemoteListener) -> Result<RuleDetails> {
        Ok(self
            .api
            .get_rule(&listener.service_id, &listener.id, rule_id)
            .await?)
    }

    /// Deletes the rule unless it is managed by someone else.
    pub async fn delete(&self, rule: &RuleSummary, listener: &RemoteListener) -> Result<()> {
        if !is_arn_managed(&*self.api, &self.cloud, &rule.arn).await? {
            info!(
                listener = %listener.id,
                rule = %rule.name,
                "Rule is not managed by this controller"
            );
            return Ok(());
        }
        info!(listener = %listener.id, rule = %rule.name, "Deleting rule");
        match self
            .api
            .delete_rule(&listener.service_id, &listener.id, &rule.id)
            .await
        {
            Ok(()) | Err(ApiError::NotFound(_)) => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

/// Two matches are equivalent when they have the same path match, method and set of header
/// matches, regardless of header order.
pub fn is_equivalent_match(a: &HttpMatch, b: &HttpMatch) -> bool {
    let same_method = match (a.method.as_deref(), b.method.as_deref()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        (None, None) => true,
        _ => false,
    };
    a.path == b.path
        && same_method
        && a.headers.len() == b.headers.len()
        && a.headers.iter().all(|h| {
            b.headers
                .iter()
                .any(|o| o.name.eq_ignore_ascii_case(&h.name) && o.exact == h.exact)
        })
        && b.headers.iter().all(|h| {
            a.headers
                .iter()
                .any(|o| o.name.eq_ignore_ascii_case(&h.name) && o.exact == h.exact)
        })
}

fn is_same_action(a: &RuleAction, b: &RuleAction) -> bool {
    match (a, b) {
        (RuleAction::Forward(a), RuleAction::Forward(b)) => {
            a.len() == b.len()
                && a.iter().collect::<HashSet<_>>() == b.iter().collect::<HashSet<_>>()
        }
        (
            RuleAction::FixedResponse { status_code: a },
            RuleAction::FixedResponse { status_code: b },
        ) => a == b,
        _ => false,
    }
}

// === impl PrioritySlots ===

impl Default for PrioritySlots {
    fn default() -> Self {
        Self([false; MAX_RULE_PRIORITY as usize + 1])
    }
}

impl PrioritySlots {
    /// Marks a priority as used. Priorities outside `1..=99` are ignored.
    pub fn occupy(&mut self, priority: u32) {
        if (MIN_RULE_PRIORITY..=MAX_RULE_PRIORITY).contains(&priority) {
            self.0[priority as usize] = true;
        }
    }

    /// Returns the lowest unused priority.
    pub fn next_free(&self) -> Option<u32> {
        (MIN_RULE_PRIORITY..=MAX_RULE_PRIORITY).find(|p| !self.0[*p as usize])
    }
}
