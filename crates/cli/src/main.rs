use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use mixedlm_core::data::DataFrame;
use mixedlm_core::diagnostics::{format_wald_tests, wald_tests};
use mixedlm_core::lmm::{likelihood_ratio_test, Criterion, FitOptions, FittedModel};
use mixedlm_core::model::LmmBuilder;

#[derive(Parser)]
#[command(name = "mixedlm")]
#[command(version)]
#[command(about = "Gaussian linear mixed models by profiled ML/REML")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a linear mixed model
    Fit {
        #[command(flatten)]
        model: ModelArgs,

        /// Use the uncorrelated (zerocorr) covariance template
        #[arg(long)]
        zerocorr: bool,

        /// Fit by maximum likelihood instead of REML
        #[arg(long)]
        ml: bool,

        /// Output format: "text" (default) or "json"
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Fit correlated and zerocorr variants by ML and compare them with a
    /// likelihood-ratio test
    Compare {
        #[command(flatten)]
        model: ModelArgs,

        /// Output format: "text" (default) or "json"
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(clap::Args)]
struct ModelArgs {
    /// Path to the data CSV file
    #[arg(short, long)]
    data: String,

    /// Response column name
    #[arg(short, long)]
    response: String,

    /// Fixed-effect covariate columns (repeatable); an intercept is implicit
    #[arg(short, long)]
    fixed: Vec<String>,

    /// Grouping factor column
    #[arg(short, long)]
    group: String,

    /// Random-slope covariate columns (repeatable); a per-level intercept is
    /// implicit
    #[arg(long)]
    random_slope: Vec<String>,

    /// Maximum simplex iterations
    #[arg(long, default_value = "1000")]
    max_iters: u64,

    /// Convergence tolerance on the simplex objective spread
    #[arg(long, default_value = "1e-10")]
    tolerance: f64,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Fit {
            model,
            zerocorr,
            ml,
            format,
        } => cmd_fit(&model, zerocorr, ml, &format),
        Commands::Compare { model, format } => cmd_compare(&model, &format),
    }
}

fn load_frame(args: &ModelArgs) -> Result<DataFrame> {
    let df = DataFrame::from_csv(&args.data)
        .with_context(|| format!("failed to load data from '{}'", args.data))?;
    eprintln!(
        "Loaded {} observations, {} columns from '{}'",
        df.nrows(),
        df.ncols(),
        args.data
    );
    Ok(df)
}

fn build_spec(
    df: &DataFrame,
    args: &ModelArgs,
    zerocorr: bool,
) -> Result<mixedlm_core::ModelSpec> {
    let fixed: Vec<&str> = args.fixed.iter().map(|s| s.as_str()).collect();
    let slopes: Vec<&str> = args.random_slope.iter().map(|s| s.as_str()).collect();

    let builder = LmmBuilder::new()
        .data(df)
        .response(&args.response)
        .fixed(&fixed);
    let builder = if zerocorr {
        builder.random_zerocorr(&args.group, &slopes)
    } else {
        builder.random(&args.group, &slopes)
    };

    builder.build().context("failed to build model")
}

fn fit_spec<'m>(
    spec: &'m mixedlm_core::ModelSpec,
    args: &ModelArgs,
    criterion: Criterion,
) -> Result<FittedModel<'m>> {
    let mut options = match criterion {
        Criterion::Ml => FitOptions::ml(),
        Criterion::Reml => FitOptions::reml(),
    };
    options.max_iters = args.max_iters;
    options.tolerance = args.tolerance;

    mixedlm_core::fit(spec, &options).context("model fitting failed")
}

fn cmd_fit(args: &ModelArgs, zerocorr: bool, ml: bool, format: &str) -> Result<()> {
    let df = load_frame(args)?;
    let spec = build_spec(&df, args, zerocorr)?;
    let criterion = if ml { Criterion::Ml } else { Criterion::Reml };

    eprintln!(
        "Model: {} fixed effects, {} covariance parameters, {}",
        spec.n_fixed(),
        spec.n_theta(),
        criterion.label()
    );

    let fitted = fit_spec(&spec, args, criterion)?;

    match format.to_lowercase().as_str() {
        "json" => print_fit_json(&fitted)?,
        _ => {
            println!("{}", fitted.summary());
            println!("{}", format_wald_tests(&wald_tests(&fitted.result)));
        }
    }

    Ok(())
}

fn cmd_compare(args: &ModelArgs, format: &str) -> Result<()> {
    let df = load_frame(args)?;

    // LRT requires ML fits of both templates on identical data
    let full_spec = build_spec(&df, args, false)?;
    let reduced_spec = build_spec(&df, args, true)?;

    let full = fit_spec(&full_spec, args, Criterion::Ml)?;
    let reduced = fit_spec(&reduced_spec, args, Criterion::Ml)?;

    let lrt = likelihood_ratio_test(&reduced, &full)?;

    match format.to_lowercase().as_str() {
        "json" => {
            let value = serde_json::json!({
                "reduced": { "deviance": reduced.deviance(), "aic": reduced.aic(), "bic": reduced.bic() },
                "full": { "deviance": full.deviance(), "aic": full.aic(), "bic": full.bic() },
                "lrt": lrt,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        _ => {
            println!("--- zerocorr (reduced) ---");
            println!("{}", reduced.summary());
            println!("--- correlated (full) ---");
            println!("{}", full.summary());
            println!(
                "LRT: statistic = {:.4}, df = {}, p = {:.4}",
                lrt.statistic, lrt.df, lrt.p_value
            );
        }
    }

    Ok(())
}

fn print_fit_json(fitted: &FittedModel) -> Result<()> {
    let value = serde_json::json!({
        "fit": fitted.result,
        "aic": fitted.aic(),
        "aicc": fitted.aicc(),
        "bic": fitted.bic(),
        "wald_tests": wald_tests(&fitted.result),
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
