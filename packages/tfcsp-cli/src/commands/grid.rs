use crate::cli::GridArgs;
use crate::exit_codes;
use crate::output;
use crate::run_config::RunConfig;
use serde::Serialize;

#[derive(Serialize)]
struct GridOutput {
    freq_windows: Vec<(f64, f64)>,
    centered_freqs: Vec<f64>,
    time_windows: Vec<(f64, f64)>,
    centered_times: Vec<f64>,
}

pub fn execute(args: GridArgs) -> i32 {
    let grid = match RunConfig::load(&args.config).and_then(|c| c.grid()) {
        Ok(g) => g,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let result = GridOutput {
        freq_windows: grid.freq_ranges(),
        centered_freqs: grid.centered_freqs(),
        time_windows: grid.time_ranges(),
        centered_times: grid.centered_times(),
    };

    if args.json {
        return if output::emit(&result, false, None) {
            exit_codes::SUCCESS
        } else {
            exit_codes::EXECUTION_ERROR
        };
    }

    println!(
        "{} frequency x {} time windows",
        result.freq_windows.len(),
        result.time_windows.len()
    );
    println!();
    println!("{:<20} {:>10}", "Frequency (Hz)", "Center");
    println!("{}", "-".repeat(31));
    for ((lo, hi), c) in result.freq_windows.iter().zip(&result.centered_freqs) {
        println!("{:<20} {:>10.2}", format!("{}–{}", lo, hi), c);
    }
    println!();
    println!("{:<20} {:>10}", "Time (s)", "Center");
    println!("{}", "-".repeat(31));
    for ((lo, hi), c) in result.time_windows.iter().zip(&result.centered_times) {
        println!("{:<20} {:>10.3}", format!("{}–{}", lo, hi), c);
    }
    exit_codes::SUCCESS
}
