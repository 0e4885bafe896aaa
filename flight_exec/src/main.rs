//! Main flight executable entry point.
//!
//! # Architecture
//!
//! The executable runs two threads:
//!
//!     - Sensor thread: replays the sensor script, feeding every message to the matching
//!       `FlightCtrl` callback. Depth clouds trigger trajectory selection from this thread.
//!     - Main thread: the fixed rate attitude tick:
//!         - Periodic re-selection, if depth images do not drive selection
//!         - Attitude target generation
//!         - Output to the flight controller sink
//!         - Cycle management
//!
//! The executable stops once the script has been fully replayed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, trace, warn};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use flight_lib::{
    att_gen,
    coord::CoordPipeline,
    fc_out::{ArchiveSink, AttitudeSink},
    flight_ctrl::{self, FlightCtrl},
    tf::{TfBuffer, TfParams},
    yaw_ctrl,
};
use util::{
    host,
    logger::{logger_init, parse_level, parse_overrides},
    script_interpreter::{PendingMsgs, ScriptInterpreter},
    session::Session,
};

mod params;
use params::FlightExecParams;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Sleep between polls of the sensor script
const REPLAY_POLL_PERIOD: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("flight_exec", "sessions").wrap_err("Failed to create the session")?;

    let exec_params: FlightExecParams = util::params::load_or_default("flight_exec.toml")
        .wrap_err("Could not load flight_exec params")?;

    // Initialise logger
    let min_level = parse_level("log_level", &exec_params.log_level)
        .wrap_err("Invalid log level")?;
    let overrides =
        parse_overrides(exec_params.logging.iter()).wrap_err("Invalid logging overrides")?;

    logger_init(min_level, &session, &overrides).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Flight Executable\n");
    info!("Running on: {}", host::get_platform());
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let flight_ctrl_params: flight_ctrl::Params = util::params::load_or_default("flight_ctrl.toml")
        .wrap_err("Could not load flight_ctrl params")?;
    let tf_params: TfParams =
        util::params::load_or_default("tf.toml").wrap_err("Could not load tf params")?;
    let att_gen_params: att_gen::Params =
        util::params::load_or_default("att_gen.toml").wrap_err("Could not load att_gen params")?;
    let yaw_ctrl_params: yaw_ctrl::Params = util::params::load_or_default("yaw_ctrl.toml")
        .wrap_err("Could not load yaw_ctrl params")?;

    debug!("FlightCtrl params: {:#?}", flight_ctrl_params);

    info!("Parameters loaded");

    // ---- INITIALISE SENSOR SOURCE ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    if args.len() != 2 {
        return Err(eyre!(
            "Expected exactly one argument (the sensor script), found {}",
            args.len() - 1
        ));
    }

    info!("Loading script from \"{}\"", &args[1]);

    let si = ScriptInterpreter::new(&args[1]).wrap_err("Failed to load script")?;

    info!(
        "Loaded script lasts {:.02} s and contains {} messages\n",
        si.get_duration(),
        si.get_num_msgs()
    );

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let tf = Arc::new(TfBuffer::from_params(&tf_params).wrap_err("Failed to initialise the TfBuffer")?);
    let coord = CoordPipeline::new(tf, Duration::from_secs_f64(tf_params.lookup_timeout_s.max(0.0)));

    let ctrl = Arc::new(FlightCtrl::new(
        flight_ctrl_params,
        att_gen_params,
        yaw_ctrl_params,
        coord,
    ));
    info!("FlightCtrl init complete");

    let mut sink: Option<ArchiveSink> = if exec_params.archive_output {
        Some(
            ArchiveSink::from_path(&session, "attitude_target.csv")
                .wrap_err("Failed to initialise the attitude target archive")?,
        )
    } else {
        None
    };

    info!("Module initialisation complete\n");

    // ---- START SENSOR THREAD ----

    let end_of_script = Arc::new(AtomicBool::new(false));

    let replay_jh = {
        let ctrl = ctrl.clone();
        let end_of_script = end_of_script.clone();
        thread::Builder::new()
            .name(String::from("sensors"))
            .spawn(move || replay(si, &ctrl, &end_of_script))
            .wrap_err("Failed to start the sensor thread")?
    };

    // ---- MAIN LOOP ----

    let cycle_period = util::time::period_from_hz(exec_params.cycle_frequency_hz).ok_or_else(|| {
        eyre!(
            "Cycle frequency must be positive, found {}",
            exec_params.cycle_frequency_hz
        )
    })?;
    let reselect_every = exec_params.reselect_every_n_ticks.max(1);

    info!("Begining main loop\n");

    let mut num_cycles: u64 = 0;
    let mut num_overruns: u64 = 0;

    while !end_of_script.load(Ordering::Relaxed) {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- PERIODIC SELECTION ----

        if !ctrl.uses_depth_image() && num_cycles % reselect_every == 0 {
            if let Err(e) = ctrl.react() {
                warn!("Error during periodic selection: {}", e);
            }
        }

        // ---- ATTITUDE TICK ----

        match ctrl.tick() {
            Ok(target) => {
                trace!("Attitude target: {:?}", target);
                if let Some(ref mut s) = sink {
                    if let Err(e) = s.publish(&target) {
                        warn!("Could not publish the attitude target: {}", e);
                    }
                }
            }
            Err(e) => warn!("Error during the attitude tick: {}", e),
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                );
                num_overruns += 1;
            }
        }

        num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    info!("End of script reached after {} cycles ({} overruns)", num_cycles, num_overruns);

    if replay_jh.join().is_err() {
        warn!("Sensor thread panicked");
    }

    match ctrl.status() {
        Ok(status) => {
            info!("Final status: {:#?}", status.counters);
            session.save("flight_ctrl_status.json", status);
        }
        Err(e) => warn!("Could not get the final status: {}", e),
    }

    if let Some(s) = sink {
        info!("{} attitude targets archived", s.num_published());
    }

    session.exit();

    info!("End of execution");

    Ok(())
}

/// Feed the script's messages to the controller as they fall due.
fn replay(mut si: ScriptInterpreter, ctrl: &FlightCtrl, end_of_script: &AtomicBool) {
    loop {
        match si.get_pending_msgs() {
            PendingMsgs::None => thread::sleep(REPLAY_POLL_PERIOD),
            PendingMsgs::Some(msgs) => {
                for msg in msgs.iter() {
                    if let Err(e) = ctrl.handle(msg) {
                        warn!("Error handling {} message: {}", msg.type_name(), e);
                    }
                }
            }
            PendingMsgs::EndOfScript => {
                info!("End of sensor script reached");
                break;
            }
        }
    }

    end_of_script.store(true, Ordering::Relaxed);
}
