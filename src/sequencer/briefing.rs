//! Pre-run briefing shown once before the first segment.

use crate::domain::{RadioType, TrainerConfig, TrainerResult};
use crate::plan::TuningPlan;
use crate::ports::OperatorConsole;

const RULE_WIDTH: usize = 112;

/// Drive window the RF2K-S tolerates. rigctl cannot set it for us.
const RECOMMENDED_DRIVE_WATTS: u32 = 13;
const MIN_DRIVE_WATTS: u32 = 4;
const MAX_DRIVE_WATTS: u32 = 39;

/// Explain what the run will do, list the checks, and wait for ENTER.
pub fn show_instructions(
    console: &mut dyn OperatorConsole,
    config: &TrainerConfig,
    plan: &TuningPlan,
) -> TrainerResult<()> {
    let rule = "=".repeat(RULE_WIDTH);
    console.say("\nINFO:\n");

    if config.amplifier.enabled {
        console.say("RF2K-S is ENABLED for programmatic control.\n");
        console.say("  -> The amplifier will be switched to Standby mode during tuning.");
        console.say("  -> After each segment the stored L and C values are read and logged.\n");
    } else {
        console.say("RF2K-S is NOT under programmatic control.\n");
        console.say("  -> Switch the amplifier to Standby mode yourself before each tune.");
        console.say("  -> L and C tuning values cannot be read or logged.\n");
    }

    let radio = &config.radio;
    console.say("Radio connection settings:");
    console.say(&format!("  - Type:  {:?}", radio.radio_type));
    console.say(&format!("  - Model: {}", radio.model.as_deref().unwrap_or("N/A")));
    console.say(&format!("  - Host:  {}", radio.host));
    console.say(&format!("  - Port:  {}\n", radio.port()));

    console.say("Bands selected for tuning:");
    for band in plan.bands() {
        console.say(&format!(
            "  - {}: {:.4} MHz to {:.4} MHz",
            band.label,
            band.band_start.as_mhz(),
            band.band_end.as_mhz()
        ));
    }
    console.say("");

    if config.defaults.use_beep {
        console.say("A short beep tells you when to key a steady carrier.");
    }
    console.say("\nBefore you begin, double-check the following:\n");
    console.say("  * The radio is powered on and connected to the network.");
    console.say("  * The RF2K-S is powered on and reachable.");
    console.say("  * Antennas are connected and suitable for tuning.");
    console.say("  * The radio transmits a steady HF carrier during each tune:");
    console.say("      CW key down, RTTY/AM carrier with PTT held, or the radio's TUNE carrier.");
    console.say("    Keep the carrier up for the entire tuning step.");
    console.say("  * Listen first and tune on a clear frequency.\n");
    console.say(&rule);

    if radio.radio_type == RadioType::Rigctl {
        console.say(&format!("\n{rule}"));
        console.say("RIGCTL WARNING: manual TX power required");
        console.say("\nrigctl does not let this program set TX power.");
        console.say("Set the transmit power on the radio before you continue.\n");
        console.say(&format!("  Recommended drive power: {RECOMMENDED_DRIVE_WATTS} W"));
        console.say(&format!(
            "  Safe range for the RF2K-S: {MIN_DRIVE_WATTS} to {MAX_DRIVE_WATTS} W\n"
        ));
        console.say(&format!(
            "  More than {MAX_DRIVE_WATTS} W may cause irreversible damage to the RF2K-S."
        ));
        console.say("  Such damage is not covered by warranty.\n");
        console.say("Check your TX power setting now.");
        console.say(&rule);
    }

    console.confirm("\n  Press ENTER to continue...")
}
