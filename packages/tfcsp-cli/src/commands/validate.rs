use crate::cli::ValidateArgs;
use crate::exit_codes;
use crate::output;
use crate::run_config::RunConfig;
use serde::Serialize;

#[derive(Serialize)]
struct ValidateOutput {
    config: String,
    valid: bool,
    contrasts: Vec<String>,
    n_freq_windows: Option<usize>,
    n_time_windows: Option<usize>,
    error: Option<String>,
}

pub fn execute(args: ValidateArgs) -> i32 {
    let mut result = ValidateOutput {
        config: args.config.display().to_string(),
        valid: false,
        contrasts: Vec::new(),
        n_freq_windows: None,
        n_time_windows: None,
        error: None,
    };

    let checked = RunConfig::load(&args.config).and_then(|config| {
        let grid = config.grid()?;
        let contrasts = config.contrasts()?;
        Ok((grid, contrasts))
    });
    match checked {
        Ok((grid, contrasts)) => {
            result.valid = true;
            result.contrasts = contrasts.iter().map(|c| c.to_string()).collect();
            result.n_freq_windows = Some(grid.n_freq_windows());
            result.n_time_windows = Some(grid.n_time_windows());
        }
        Err(msg) => result.error = Some(msg),
    }

    if args.json {
        if !output::emit(&result, false, None) {
            return exit_codes::EXECUTION_ERROR;
        }
    } else if let Some(ref err) = result.error {
        eprintln!("Error: {}", err);
    } else {
        println!(
            "Config '{}' is valid ({} contrast(s), {} frequency x {} time windows)",
            result.config,
            result.contrasts.len(),
            result.n_freq_windows.unwrap_or(0),
            result.n_time_windows.unwrap_or(0)
        );
    }

    if result.valid {
        exit_codes::SUCCESS
    } else {
        exit_codes::INPUT_ERROR
    }
}
