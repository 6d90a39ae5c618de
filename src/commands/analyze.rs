use crate::analysis::aggregation::ResultStatisticsAnalyser;
use crate::analysis::proposers::{LinearLawProposer, MeanValueProposer};
use crate::analysis::{AnalysisController, BoardContributor};
use crate::config::{Config, TimeoutStrategy, CONFIG_FILE};
use crate::io::{load_universe, ReplayTool};
use crate::judge::FinalJudge;
use crate::output::{AnalysisReport, OutputFormat};
use crate::timeout::{
    AgeingEstimator, FixedTimeout, NoTimeout, RegressionEstimator, TimeoutEstimator,
    TimeoutWatcher,
};
use anyhow::{Context, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct AnalyzeOptions {
    pub universe: PathBuf,
    pub trace: PathBuf,
    pub config: Option<PathBuf>,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub max_rounds: Option<usize>,
    pub progress: bool,
}

pub fn run(options: AnalyzeOptions) -> Result<()> {
    let config_path = options
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let config = Config::load(&config_path)?;

    let universe = load_universe(&options.universe)?;
    let mut tool = ReplayTool::from_trace(&options.trace, &universe)?;
    info!(
        "analysing {} element(s) against trace {}",
        universe.len(),
        options.trace.display()
    );

    let estimator = build_estimator(&config);
    estimator.init()?;
    estimator.on_timeout(Box::new(|| {
        warn!("time budget exhausted, finishing the current round");
    }));
    let _watcher = TimeoutWatcher::spawn(Arc::clone(&estimator));
    let judge = FinalJudge::new(estimator, config.judge.clone());
    let contributors: Vec<Box<dyn BoardContributor>> = vec![
        Box::new(MeanValueProposer),
        Box::new(LinearLawProposer),
        Box::new(ResultStatisticsAnalyser),
    ];
    let max_rounds = options.max_rounds.unwrap_or(config.analysis.max_rounds);

    let mut controller = AnalysisController::new(universe, contributors, judge, max_rounds)
        .with_progress(options.progress);
    let summary = controller.run(&mut tool)?;

    let report = AnalysisReport::from_summary(&summary);
    let rendered = report.render(options.format)?;
    emit(&rendered, options.output.as_deref())
}

fn build_estimator(config: &Config) -> Arc<dyn TimeoutEstimator> {
    match config.timeout.strategy {
        TimeoutStrategy::None => Arc::new(NoTimeout::new()),
        TimeoutStrategy::Fixed => Arc::new(FixedTimeout::new(config.fixed_budget())),
        TimeoutStrategy::Regression => Arc::new(RegressionEstimator::new(
            config.timeout.regression_window,
            config.regression_tolerance(),
        )),
        TimeoutStrategy::Ageing => Arc::new(AgeingEstimator::new(
            config.timeout.ageing_factor,
            config.ageing_seed(),
            config.timeout.ageing_multiplicative_slack,
            config.ageing_additive_slack(),
        )),
    }
}

fn emit(rendered: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("failed to write report to {}", path.display())),
        None => {
            print!("{rendered}");
            Ok(())
        }
    }
}
