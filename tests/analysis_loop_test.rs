use perfmap::analysis::aggregation::ResultStatisticsAnalyser;
use perfmap::analysis::proposers::{LinearLawProposer, MeanValueProposer};
use perfmap::analysis::{AnalysisController, BoardContributor};
use perfmap::config::JudgeConfig;
use perfmap::expression::Assignment;
use perfmap::fitness::{best_proposal, MeanSquaredError};
use perfmap::io::ReplayTool;
use perfmap::judge::FinalJudge;
use perfmap::measurement::events::MeasurementEvent;
use perfmap::measurement::results::{Parameterisation, ResourceType};
use perfmap::measurement::{CodeSection, MeasurableElement};
use perfmap::timeout::NoTimeout;
use perfmap::ReadOnlyView;
use std::sync::Arc;

fn section(start: usize) -> CodeSection {
    CodeSection::new("src/server.rs", start, start + 20)
}

fn demand_element() -> MeasurableElement {
    MeasurableElement::ResourceDemand {
        section: section(0),
        resource: ResourceType::Cpu,
    }
}

fn loop_element() -> MeasurableElement {
    MeasurableElement::Loop {
        section: section(100),
        body: section(110),
    }
}

fn capture(value: f64, n: f64) -> MeasurementEvent {
    MeasurementEvent::ResourceDemandCaptured {
        section: section(0),
        resource: ResourceType::Cpu,
        value,
        parameterisation: Some(Parameterisation::new().with("n", n)),
    }
}

fn body_pass() -> [MeasurementEvent; 2] {
    [
        MeasurementEvent::SectionEntered {
            section: section(110),
            parameterisation: None,
        },
        MeasurementEvent::SectionLeft {
            section: section(110),
        },
    ]
}

fn contributors() -> Vec<Box<dyn BoardContributor>> {
    vec![
        Box::new(MeanValueProposer),
        Box::new(LinearLawProposer),
        Box::new(ResultStatisticsAnalyser),
    ]
}

fn judge() -> FinalJudge {
    FinalJudge::new(Arc::new(NoTimeout::new()), JudgeConfig::default())
}

#[test]
fn full_run_proposes_a_model_for_every_measured_element() {
    // Demand samples follow 2n + 1 exactly; the loop body runs three times.
    let mut events: Vec<MeasurementEvent> = vec![
        capture(3.0, 1.0),
        capture(5.0, 2.0),
        capture(7.0, 3.0),
        MeasurementEvent::SectionEntered {
            section: section(100),
            parameterisation: None,
        },
    ];
    for _ in 0..3 {
        events.extend(body_pass());
    }
    events.push(MeasurementEvent::SectionLeft {
        section: section(100),
    });

    let universe = vec![demand_element(), loop_element()];
    let mut tool = ReplayTool::new(events, &universe);
    let mut controller = AnalysisController::new(universe, contributors(), judge(), 20);
    let summary = controller.run(&mut tool).expect("run should finish");

    assert!(summary.contribution_passes >= 2);
    assert_eq!(summary.dropped_events, 0);

    let board = ReadOnlyView::new(summary.board);
    for element in [demand_element(), loop_element()] {
        let results = board.results_for(&element).unwrap();
        assert!(!results.is_empty(), "no facts for {}", element.id());
        let proposals = board.proposals_for(&element).unwrap();
        assert!(!proposals.is_empty(), "no proposal for {}", element.id());
    }

    // The linear law should nail the demand samples exactly.
    let results = board.results_for(&demand_element()).unwrap();
    let proposals = board.proposals_for(&demand_element()).unwrap();
    let (best, fitness) =
        best_proposal(&MeanSquaredError, &proposals, &results).expect("gradable proposals");
    assert!(fitness < 1e-9, "best fitness was {fitness}");
    let predicted = best
        .evaluate(&Assignment::from([("n".to_string(), 10.0)]))
        .unwrap();
    assert!((predicted - 21.0).abs() < 1e-6);

    // The statistics analyser kept its slot current and exhausted itself.
    let statistics = board
        .slot::<ResultStatisticsAnalyser>()
        .expect("statistics slot");
    assert_eq!(statistics.get(&demand_element().id()).unwrap().samples, 3);
    assert!(!ResultStatisticsAnalyser.can_contribute(&board));
    assert!(!MeanValueProposer.can_contribute(&board));
    assert!(!LinearLawProposer.can_contribute(&board));
}

#[test]
fn malformed_events_are_counted_but_do_not_stop_the_run() {
    let events = vec![
        capture(4.0, 1.0),
        // Left without a matching enter.
        MeasurementEvent::SectionLeft {
            section: section(110),
        },
        // Unknown section entirely.
        MeasurementEvent::SectionEntered {
            section: section(900),
            parameterisation: None,
        },
    ];
    let universe = vec![demand_element(), loop_element()];
    let mut tool = ReplayTool::new(events, &universe);
    let mut controller = AnalysisController::new(universe, contributors(), judge(), 5);
    let summary = controller.run(&mut tool).expect("run should finish");

    assert!(summary.dropped_events >= 2);
    let board = ReadOnlyView::new(summary.board);
    assert_eq!(board.results_for(&demand_element()).unwrap().len(), 1);
}

#[test]
fn exhausted_trace_leaves_unmeasured_elements_without_proposals() {
    let universe = vec![demand_element(), loop_element()];
    let mut tool = ReplayTool::new(vec![capture(4.0, 1.0)], &universe);
    let mut controller = AnalysisController::new(universe, contributors(), judge(), 3);
    let summary = controller.run(&mut tool).expect("run should finish");

    let board = ReadOnlyView::new(summary.board);
    assert!(board.results_for(&loop_element()).unwrap().is_empty());
    assert!(board.proposals_for(&loop_element()).unwrap().is_empty());
    assert!(!board.proposals_for(&demand_element()).unwrap().is_empty());
}
