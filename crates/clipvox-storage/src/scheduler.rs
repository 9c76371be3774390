use std::ops::Range;

use clipvox_core::types::UpdatePolicy;

use crate::planner::CascadePlan;

/// The only state carried from one frame to the next: which cascade was refreshed last.
///
/// Advanced once per frame by [`SchedulerState::advance`], independent of the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerState {
    current_cascade: Option<u32>,
}

impl SchedulerState {
    /// State for the next frame. The first frame refreshes cascade 0.
    pub fn advance(self, cascade_count: u32) -> Self {
        let next = match self.current_cascade {
            Some(current) if current + 1 < cascade_count => current + 1,
            _ => 0,
        };
        Self {
            current_cascade: Some(next),
        }
    }

    /// Cascade refreshed this frame (0 before the first advance).
    pub fn current_cascade(&self) -> u32 {
        self.current_cascade.unwrap_or(0)
    }
}

/// Everything the per-frame steps need to know about which levels refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSchedule {
    pub policy: UpdatePolicy,
    pub current_cascade: u32,
    pub cascade_count: u32,
    pub mip_count: u32,
}

impl FrameSchedule {
    pub fn new(plan: &CascadePlan, policy: UpdatePolicy, state: SchedulerState) -> Self {
        Self {
            policy,
            current_cascade: state.current_cascade().min(plan.cascade_count - 1),
            cascade_count: plan.cascade_count,
            mip_count: plan.mip_count,
        }
    }

    /// Whether level `level` (cascade or mip) is refreshed this frame.
    ///
    /// Mip levels are rebuilt only right after the coarsest cascade refreshes.
    pub fn should_update(&self, level: usize) -> bool {
        match self.policy {
            UpdatePolicy::SingleCascade => {
                let level = level as u64;
                let current = self.current_cascade as u64;
                let cascades = self.cascade_count as u64;
                level == current || (level >= cascades && current == cascades - 1)
            }
            UpdatePolicy::AllCascadesWideDispatch | UpdatePolicy::AllCascadesMultiplePasses => true,
        }
    }

    /// Cascades voxelized and compacted this frame.
    pub fn refreshed_cascades(&self) -> Range<u32> {
        match self.policy {
            UpdatePolicy::SingleCascade => self.current_cascade..self.current_cascade + 1,
            UpdatePolicy::AllCascadesWideDispatch | UpdatePolicy::AllCascadesMultiplePasses => {
                0..self.cascade_count
            }
        }
    }

    /// Cascade ranges covered by one pass set or dispatch each, in submission order.
    pub fn cascade_batches(&self) -> Vec<Range<u32>> {
        match self.policy {
            UpdatePolicy::SingleCascade | UpdatePolicy::AllCascadesWideDispatch => {
                vec![self.refreshed_cascades()]
            }
            UpdatePolicy::AllCascadesMultiplePasses => {
                (0..self.cascade_count).map(|c| c..c + 1).collect()
            }
        }
    }

    /// Cascade refreshed next frame under round robin.
    pub fn next_cascade(&self) -> u32 {
        if self.current_cascade + 1 < self.cascade_count {
            self.current_cascade + 1
        } else {
            0
        }
    }
}
