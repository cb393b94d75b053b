#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use testlens_core::event::{Action, Event};
use testlens_core::parser::EventParser;

#[derive(Debug, Arbitrary)]
enum FuzzAction {
    Download,
    DownloadFailed,
    Package,
    Run,
    Pause,
    Cont,
    Pass,
    Fail,
    Skip,
    PassFinal,
    FailFinal,
    SkipFinal,
    Coverage,
    Stdout,
}

#[derive(Debug, Arbitrary)]
struct FuzzEvent {
    action: FuzzAction,
    package: u8,
    test: u8,
    output: String,
    json: bool,
}

impl FuzzEvent {
    fn into_event(self) -> Event {
        let action = match self.action {
            FuzzAction::Download => Action::Download,
            FuzzAction::DownloadFailed => Action::DownloadFailed,
            FuzzAction::Package => Action::Package,
            FuzzAction::Run => Action::Run,
            FuzzAction::Pause => Action::Pause,
            FuzzAction::Cont => Action::Cont,
            FuzzAction::Pass => Action::Pass,
            FuzzAction::Fail => Action::Fail,
            FuzzAction::Skip => Action::Skip,
            FuzzAction::PassFinal => Action::PassFinal,
            FuzzAction::FailFinal => Action::FailFinal,
            FuzzAction::SkipFinal => Action::SkipFinal,
            FuzzAction::Coverage => Action::Coverage,
            FuzzAction::Stdout => Action::Stdout,
        };
        // Small name spaces so packages and tests collide often
        let package = match self.package % 4 {
            0 => String::new(),
            n => format!("pkg{n}"),
        };
        let test = match self.test % 5 {
            0 => String::new(),
            1 => "TestA".to_string(),
            2 => "TestA/sub".to_string(),
            n => format!("Test{n}"),
        };
        let mut event = Event::new(action)
            .with_package(package)
            .with_test(test)
            .with_output(self.output);
        if self.json {
            event = event.json_sourced();
        }
        event
    }
}

fuzz_target!(|events: Vec<FuzzEvent>| {
    let mut parser = EventParser::new();
    let mut downloads_seen = 0;
    for event in events {
        match parser.process(event.into_event()) {
            Ok(emitted) => {
                downloads_seen += emitted
                    .iter()
                    .filter(|e| matches!(e, testlens_core::Emission::Downloads(_)))
                    .count();
            }
            Err(_) => return,
        }
    }
    downloads_seen += parser
        .finish()
        .iter()
        .filter(|e| matches!(e, testlens_core::Emission::Downloads(_)))
        .count();
    assert_eq!(downloads_seen, 1);
});
