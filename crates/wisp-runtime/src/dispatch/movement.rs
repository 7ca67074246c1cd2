//! Movement events and narration.
//!
//! After a successful move every object in the source and the
//! destination, except the mover, gets one `movement` emit. Observers
//! with an attached session also get exactly one line of narration:
//!
//! | Mover's `Active` | Narration |
//! |------------------|-----------|
//! | false | generated from `Verb` and the exit name |
//! | true  | the mover's `renderMovement` callback emits `movementRendered` back to the observer; generated text if it does not claim the event |
//!
//! Observers who cannot see the mover get no narration.
//!
//! Only the first `movementRendered` that the `renderMovement` invocation
//! sends to its observer is printed. It is queued at the movement's own
//! depth, so a render that ran is never cut off by the emit limit. A
//! `movementRendered` sent any other way is an ordinary event. When the
//! render delivery itself is dropped for depth, the generated text is
//! printed instead.

use super::{Cascade, Delivery, Dispatcher};
use crate::challenge;
use crate::containment::MoveRecord;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;
use wisp_script::Trigger;
use wisp_types::{event, events, Object, ObjectId};

/// Which side of the move an observer is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Side {
    Source,
    Destination,
}

impl Dispatcher {
    pub(crate) fn after_move(
        &self,
        record: &MoveRecord,
        exit: Option<&str>,
        cascade: &Arc<Cascade>,
        depth: usize,
    ) {
        if !record.changed() {
            return;
        }
        let store = &self.inner.store;
        let Ok(mover) = store.get(&record.object) else {
            return;
        };

        let mut observers: Vec<(ObjectId, Side)> = Vec::new();
        for (place, side) in [
            (&record.source, Side::Source),
            (&record.destination, Side::Destination),
        ] {
            let content: BTreeSet<ObjectId> =
                store.get(place).map(|o| o.content).unwrap_or_default();
            observers.extend(
                content
                    .into_iter()
                    .filter(|id| *id != mover.id)
                    .map(|id| (id, side)),
            );
        }
        observers.sort();

        for (observer_id, side) in observers {
            cascade.push(Delivery::new(
                observer_id.clone(),
                Trigger::emit(
                    events::MOVEMENT,
                    event::movement_payload(
                        &mover.id,
                        &record.source,
                        &record.destination,
                        exit,
                        &observer_id,
                    ),
                ),
                depth,
            ));

            if !self.inner.outputs.has_session(&observer_id) {
                continue;
            }
            let Ok(observer) = store.get(&observer_id) else {
                continue;
            };
            if !challenge::is_visible(&mover, &observer) {
                debug!(mover = %mover.id, observer = %observer_id, "movement unseen");
                continue;
            }

            let text = narration(&mover, &observer, exit, side);
            if mover.movement.active {
                cascade.push(
                    Delivery::new(
                        mover.id.clone(),
                        Trigger::emit(
                            events::RENDER_MOVEMENT,
                            event::render_movement_payload(
                                &observer_id,
                                &record.source,
                                &record.destination,
                                exit,
                            ),
                        ),
                        depth,
                    )
                    .with_fallback(observer_id, text),
                );
            } else {
                self.inner.outputs.print(&observer_id, &text);
            }
        }
    }
}

/// Generated narration of `mover` as `observer` sees it.
fn narration(mover: &Object, observer: &Object, exit: Option<&str>, side: Side) -> String {
    let name = capitalize(&challenge::name_for(mover, observer));
    let verb = mover.movement.verb();
    match (side, exit) {
        (Side::Source, Some(exit)) => format!("{name} {verb} {exit}."),
        (Side::Source, None) => format!("{name} {verb} away."),
        (Side::Destination, _) => format!("{name} {verb} in."),
    }
}

pub(crate) fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
