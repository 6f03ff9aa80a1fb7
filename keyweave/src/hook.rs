//! Command hooks.
//!
//! A hook lets one command claim another: while claimed, the target's press
//! and release are routed to the hook owner instead of the target's own
//! handlers. A target can be claimed by one hook at a time.

use heapless::Vec;

use crate::command::CommandId;

/// Max number of hooks active at the same time
pub const HOOK_MAX_NUM: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HookError {
    /// The hook owner already holds a claim
    AlreadyActive,
    /// The target is claimed by a different hook, or no slot is left
    TargetClaimed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Claim {
    owner: CommandId,
    target: CommandId,
}

#[derive(Default)]
pub struct HookTable {
    claims: Vec<Claim, HOOK_MAX_NUM>,
}

impl HookTable {
    pub fn new() -> Self {
        Self { claims: Vec::new() }
    }

    pub fn start_hook(&mut self, owner: CommandId, target: CommandId) -> Result<(), HookError> {
        if self.claims.iter().any(|c| c.owner == owner) {
            return Err(HookError::AlreadyActive);
        }
        if self.claims.iter().any(|c| c.target == target) {
            return Err(HookError::TargetClaimed);
        }
        self.claims
            .push(Claim { owner, target })
            .map_err(|_| HookError::TargetClaimed)
    }

    pub fn end_hook(&mut self, owner: CommandId) {
        self.claims.retain(|c| c.owner != owner);
    }

    /// The hook owner claiming `target`, if any
    pub fn claimant(&self, target: CommandId) -> Option<CommandId> {
        self.claims.iter().find(|c| c.target == target).map(|c| c.owner)
    }

    pub fn is_active(&self, owner: CommandId) -> bool {
        self.claims.iter().any(|c| c.owner == owner)
    }
}
