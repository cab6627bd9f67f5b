/// Rewriting options
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Where the new local variable slot goes
    pub strategy: SlotStrategy,

    /// What to do with compact stack map frames that cannot be forwarded as is once slots have
    /// been inserted below the locals they describe
    ///
    /// Only used by [`SlotStrategy::Prepend`]: appending never invalidates frames.
    pub frame_policy: FramePolicy,
}

impl Settings {
    pub fn new(strategy: SlotStrategy) -> Settings {
        Settings {
            strategy,
            frame_policy: FramePolicy::Reconstruct,
        }
    }
}

impl Default for Settings {
    fn default() -> Settings {
        Settings::new(SlotStrategy::Prepend)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlotStrategy {
    /// Insert the new slot right after the receiver and parameters, shifting every other local up
    Prepend,

    /// Put the new slot above every slot the method already uses
    Append,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FramePolicy {
    /// Turn the frame into a full frame
    Reconstruct,

    /// Fail with [`crate::jvm::FrameErrorKind::CompactFrameAcrossBoundary`]
    Reject,
}
