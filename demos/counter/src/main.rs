//! End-to-end walk of the broker: one provider, a slice subscriber on
//! "count", a whole-state reader, and a write-only handle whose version only
//! moves when the step changes.

use anyhow::Result;
use strata_core::Broker;
use strata_ui::{SliceHandle, StateHandle, WriterHandle, use_slice, use_state, use_writer, with_broker};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Counter {
    count: i64,
    step: i64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct StepWriter {
    step: i64,
}

#[derive(Clone, Copy, Debug)]
enum Action {
    Increment,
    SetStep(i64),
}

fn main() -> Result<()> {
    env_logger::init();

    let broker = Broker::with_writer(
        Counter { count: 0, step: 1 },
        |emit, prev: &Counter, action| match action {
            Action::Increment => {
                emit.emit("count");
                Counter {
                    count: prev.count + prev.step,
                    ..*prev
                }
            }
            Action::SetStep(step) => {
                emit.emit("step");
                Counter { step, ..*prev }
            }
        },
        |s| StepWriter { step: s.step },
    );

    with_broker(&broker, || -> Result<()> {
        let slice: SliceHandle<Counter, Action, StepWriter> = use_slice(["count"], true)?;
        let whole: StateHandle<Counter, Action, StepWriter> = use_state()?;
        let writer: WriterHandle<Counter, Action, StepWriter> = use_writer()?;

        println!("bootstrap: {:?}", slice.state());

        writer.dispatch(Action::Increment);
        writer.dispatch(Action::Increment);
        println!(
            "after two increments: slice {:?}, whole v{}, writer changed: {}",
            slice.state(),
            whole.version(),
            writer.changed()
        );

        writer.dispatch(Action::SetStep(10));
        println!(
            "after step change: slice still {:?} (not its id), writer {:?}",
            slice.state(),
            writer.writer()
        );

        slice.set_subscribed(false);
        writer.dispatch(Action::Increment);
        slice.set_subscribed(true);
        println!("resubscribed: slice {:?}", slice.state());

        log::info!("final snapshot {:?}", whole.get());
        Ok(())
    })?;

    Ok(())
}
