use serde::{Deserialize, Serialize};

/// Published by the mining controller. `is_mining` is only true while a
/// single manual mine request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningState {
    pub is_automine: bool,
    pub is_mining: bool,
    pub last_mined_block: Option<u64>,
}

impl Default for MiningState {
    // Development nodes boot with automine on.
    fn default() -> Self {
        Self {
            is_automine: true,
            is_mining: false,
            last_mined_block: None,
        }
    }
}

/// Published by the block clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockState {
    pub latest_block: Option<u64>,
    pub seconds_since_last_block: u64,
}
