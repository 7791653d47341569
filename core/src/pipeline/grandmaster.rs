//! Grandmaster Scaler (§4.G): applies the per-universe and global masters as the final
//! pipeline stage before output, skipping any channel the Modifier Layer parked.

use crate::model::universe::Universe;

/// Scales one universe's 512 post-modifier values by `universe_master` and
/// `global_master`, both 0..=255, leaving `parked` channels untouched.
///
/// Scaling is computed in a 16-bit intermediate and rounded, matching Invariant 3 in §9:
/// `output = round(pipeline * universe_master/255 * global_master/255)`.
pub fn apply_grandmaster(
    values: [u8; Universe::CHANNEL_COUNT],
    parked: &[bool; Universe::CHANNEL_COUNT],
    universe_master: u8,
    global_master: u8,
) -> [u8; Universe::CHANNEL_COUNT] {
    let mut output = values;
    for (idx, value) in output.iter_mut().enumerate() {
        if parked[idx] {
            continue;
        }
        *value = scale(*value, universe_master, global_master);
    }
    output
}

/// `round(value * universe_master / 255 * global_master / 255)`, computed without an
/// intermediate floating-point division so the result is reproducible bit-for-bit.
fn scale(value: u8, universe_master: u8, global_master: u8) -> u8 {
    let after_universe = round_div_255(u32::from(value) * u32::from(universe_master));
    let after_global = round_div_255(after_universe * u32::from(global_master));
    after_global.min(255) as u8
}

fn round_div_255(numerator: u32) -> u32 {
    (numerator + 127) / 255
}
