use tracing::{debug, error, info, warn};

use crate::domain::{ErrorCode, Notification, RequestContext, TrackerId};
use crate::manager::{SmsManager, SmsManagerError};
use crate::platform::{CompletionExtras, CompletionTarget, ResultCode};
use crate::registry::{Phase, SentRecord};

/// How a phase ended once its last segment completed.
#[derive(Debug, Clone, Copy)]
enum PhaseOutcome {
    SendFailed(ErrorCode),
    Sent(SentRecord),
    DeliveryFailed,
    /// Carries the SENT record, if the send succeeded first.
    Delivered(Option<SentRecord>),
}

impl SmsManager {
    /// Number of segments the platform would split `text` into.
    pub fn number_of_segments(&self, text: &str) -> usize {
        self.transport.divide_message(text).len()
    }

    /// Send `message` to `number`.
    ///
    /// The outcome reaches the host as exactly one of
    /// [`Notification::SendSucceeded`] or [`Notification::SendFailed`], followed by
    /// [`Notification::Delivered`] once every segment has been delivered.
    pub fn send(&self, number: &str, message: &str, request: RequestContext) {
        if let Err(err) = self.dispatch_send(number, message, request) {
            error!(%err, request_id = request.request_id, "failed to send an SMS");
            self.host.notify(Notification::SendFailed {
                error: ErrorCode::Unknown,
                request,
            });
        }
    }

    fn dispatch_send(
        &self,
        number: &str,
        message: &str,
        request: RequestContext,
    ) -> Result<TrackerId, SmsManagerError> {
        let destination = self.destination(number)?;

        let parts = if message.chars().count() <= self.config.single_segment_limit {
            None
        } else {
            let parts = self.transport.divide_message(message);
            if parts.is_empty() {
                return Err(SmsManagerError::NoSegments);
            }
            Some(parts)
        };

        let tracker = self.trackers.create(parts.as_ref().map_or(1, Vec::len));
        let extras = CompletionExtras {
            tracker,
            number: destination.raw().to_owned(),
            message: message.to_owned(),
            request,
        };

        let dispatched = match parts {
            None => self.transport.send_text(
                &destination,
                message,
                self.completion_target(Phase::Sent, &extras),
                self.completion_target(Phase::Delivered, &extras),
            ),
            Some(parts) => {
                let (sent, delivered) = parts
                    .iter()
                    .map(|_| {
                        (
                            self.completion_target(Phase::Sent, &extras),
                            self.completion_target(Phase::Delivered, &extras),
                        )
                    })
                    .unzip();
                self.transport
                    .send_multipart(&destination, parts, sent, delivered)
            }
        };

        if let Err(err) = dispatched {
            self.trackers.destroy(tracker);
            return Err(err.into());
        }

        debug!(%tracker, number = %destination.raw(), "SMS handed to the platform");
        Ok(tracker)
    }

    fn completion_target(&self, phase: Phase, extras: &CompletionExtras) -> CompletionTarget {
        CompletionTarget {
            token: self.tokens.next_token(),
            phase,
            extras: extras.clone(),
        }
    }

    pub(super) fn on_completion(
        &self,
        phase: Phase,
        result: ResultCode,
        extras: CompletionExtras,
    ) {
        let tracker = extras.tracker;
        let outcome = self.trackers.update(tracker, |state| {
            if !state.decrement(phase) {
                return None;
            }
            if !result.is_ok() {
                if phase == Phase::Sent {
                    state.set_error(result.error_code());
                }
                state.mark_failed(phase);
                info!(%tracker, ?phase, code = result.as_i32(), "SMS part failed");
            }
            if state.has_remaining(phase) {
                return None;
            }
            // The sent copy is saved and recorded under the tracker lock, so a
            // DELIVERED phase finishing concurrently always sees the record.
            Some(match (phase, state.is_failing(phase)) {
                (Phase::Sent, true) => PhaseOutcome::SendFailed(state.error()),
                (Phase::Sent, false) => {
                    let timestamp = self.now();
                    let message_id = self
                        .save_sent_message(&extras.number, &extras.message, timestamp)
                        .ok();
                    let record = SentRecord {
                        message_id,
                        timestamp,
                    };
                    state.record_sent(record);
                    PhaseOutcome::Sent(record)
                }
                (Phase::Delivered, true) => PhaseOutcome::DeliveryFailed,
                (Phase::Delivered, false) => PhaseOutcome::Delivered(state.sent_record()),
            })
        });

        match outcome {
            None => warn!(%tracker, ?phase, "completion for a tracker that is gone"),
            Some(None) => {}
            Some(Some(outcome)) => {
                self.finish_phase(outcome, extras);
                self.trackers.destroy_if_settled(tracker);
            }
        }
    }

    fn finish_phase(&self, outcome: PhaseOutcome, extras: CompletionExtras) {
        let CompletionExtras {
            tracker,
            number,
            message,
            request,
        } = extras;

        match outcome {
            PhaseOutcome::SendFailed(error) => {
                info!(%tracker, ?error, "SMS sending failed");
                self.host.notify(Notification::SendFailed { error, request });
            }
            PhaseOutcome::Sent(SentRecord {
                message_id,
                timestamp,
            }) => {
                info!(%tracker, ?message_id, "SMS sending was successful");
                self.host.notify(Notification::SendSucceeded {
                    message_id,
                    receiver: number,
                    body: message,
                    timestamp,
                    request,
                });
            }
            PhaseOutcome::DeliveryFailed => {
                error!(%tracker, "SMS delivery failed");
            }
            PhaseOutcome::Delivered(sent) => match sent {
                Some(record) => {
                    info!(%tracker, "SMS successfully delivered");
                    self.host.notify(Notification::Delivered {
                        message_id: record.message_id,
                        receiver: number,
                        body: message,
                        timestamp: record.timestamp,
                    });
                }
                None => {
                    warn!(%tracker, "SMS delivered without a successful send, not reporting it");
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use phonenumber::country;

    use super::*;
    use crate::domain::{MessageBox, MessageId, Timestamp};
    use crate::platform::memory::MemoryStore;
    use crate::platform::{Broadcast, BroadcastExtras, KnownResultCode, ResultCode};
    use crate::testing::{GatedStore, RecordingHost, RecordingTransport, manager, started};

    const OK: ResultCode = ResultCode::OK;

    fn request() -> RequestContext {
        RequestContext::new(7, 42)
    }

    fn failure(code: KnownResultCode) -> ResultCode {
        code.into()
    }

    #[test]
    fn single_segment_send_reports_success_then_delivery() {
        let transport = Arc::new(RecordingTransport::new());
        let store = Arc::new(MemoryStore::new());
        let host = Arc::new(RecordingHost::new());
        let sms = started(&transport, store.clone(), &host);

        sms.send("+100", "hello", request());
        let sent = transport.last_send();
        assert_eq!(sent.destination, "+100");
        assert_eq!(sent.parts, vec!["hello".to_owned()]);
        assert!(!sent.multipart);
        assert_eq!(sms.pending_sends(), 1);
        host.assert_quiet();

        sms.on_broadcast(sent.sent[0].broadcast(OK));
        let tracker = sent.sent[0].extras.tracker;
        assert_eq!(
            host.take(),
            vec![Notification::SendSucceeded {
                message_id: Some(MessageId::new(1)),
                receiver: "+100".to_owned(),
                body: "hello".to_owned(),
                timestamp: Timestamp::from_millis(1_000),
                request: request(),
            }]
        );
        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, MessageBox::Sent.code());
        assert_eq!(rows[0].address, "+100");
        assert_eq!(rows[0].date, 1_000);
        assert!(sms.tracker(tracker).is_some());

        sms.on_broadcast(sent.delivered[0].broadcast(OK));
        assert_eq!(
            host.take(),
            vec![Notification::Delivered {
                message_id: Some(MessageId::new(1)),
                receiver: "+100".to_owned(),
                body: "hello".to_owned(),
                timestamp: Timestamp::from_millis(1_000),
            }]
        );
        assert!(sms.tracker(tracker).is_none());
        assert_eq!(sms.pending_sends(), 0);
    }

    #[test]
    fn delivery_finishing_while_the_sent_copy_is_saved_is_still_reported() {
        let transport = Arc::new(RecordingTransport::new());
        let rows = Arc::new(MemoryStore::new());
        let (store, entered, release) = GatedStore::new(rows.clone());
        let host = Arc::new(RecordingHost::new());
        let sms = started(&transport, Arc::new(store), &host);

        sms.send("+100", "hello", request());
        let sent = transport.last_send();

        std::thread::scope(|scope| {
            scope.spawn(|| sms.on_broadcast(sent.sent[0].broadcast(OK)));
            entered
                .recv_timeout(std::time::Duration::from_secs(5))
                .expect("the sent copy was never saved");
            scope.spawn(|| sms.on_broadcast(sent.delivered[0].broadcast(OK)));
            std::thread::sleep(std::time::Duration::from_millis(50));
            release.send(()).unwrap();
        });

        let notifications = host.take();
        assert_eq!(notifications.len(), 2, "{notifications:?}");
        assert!(
            notifications
                .iter()
                .any(|n| matches!(n, Notification::SendSucceeded { .. }))
        );
        assert!(notifications.contains(&Notification::Delivered {
            message_id: Some(MessageId::new(1)),
            receiver: "+100".to_owned(),
            body: "hello".to_owned(),
            timestamp: Timestamp::from_millis(1_000),
        }));
        assert_eq!(rows.rows().len(), 1);
        assert_eq!(sms.pending_sends(), 0);
    }

    #[test]
    fn out_of_order_multipart_failure_reports_mapped_error() {
        let transport = Arc::new(RecordingTransport::new().segment_size(100));
        let store = Arc::new(MemoryStore::new());
        let host = Arc::new(RecordingHost::new());
        let sms = started(&transport, store.clone(), &host);

        sms.send("+100", &"x".repeat(300), request());
        let sent = transport.last_send();
        assert!(sent.multipart);
        assert_eq!(sent.parts.len(), 3);
        assert_eq!(sent.sent.len(), 3);
        assert_eq!(sent.delivered.len(), 3);

        sms.on_broadcast(sent.sent[2].broadcast(OK));
        sms.on_broadcast(sent.sent[0].broadcast(failure(KnownResultCode::NoService)));
        host.assert_quiet();
        sms.on_broadcast(sent.sent[1].broadcast(OK));
        assert_eq!(
            host.take(),
            vec![Notification::SendFailed {
                error: ErrorCode::NoSignal,
                request: request(),
            }]
        );
        assert!(store.rows().is_empty());
        assert_eq!(sms.pending_sends(), 1);

        for target in &sent.delivered {
            sms.on_broadcast(target.broadcast(OK));
        }
        host.assert_quiet();
        assert_eq!(sms.pending_sends(), 0);
    }

    #[test]
    fn every_sent_order_yields_one_success_after_the_last_part() {
        let orders = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        for order in orders {
            let transport = Arc::new(RecordingTransport::new().segment_size(100));
            let host = Arc::new(RecordingHost::new());
            let sms = started(&transport, Arc::new(MemoryStore::new()), &host);

            sms.send("+100", &"x".repeat(300), request());
            let sent = transport.last_send();
            // Interleave deliveries ahead of the matching SENT completions.
            for (step, &part) in order.iter().enumerate() {
                sms.on_broadcast(sent.delivered[part].broadcast(OK));
                if step < 2 {
                    sms.on_broadcast(sent.sent[part].broadcast(OK));
                    host.assert_quiet();
                }
            }
            sms.on_broadcast(sent.sent[order[2]].broadcast(OK));

            let notifications = host.take();
            assert_eq!(notifications.len(), 1, "order {order:?}");
            assert!(matches!(
                notifications[0],
                Notification::SendSucceeded { .. }
            ));
            assert_eq!(sms.pending_sends(), 0, "order {order:?}");
        }
    }

    #[test]
    fn delivery_reported_only_after_every_part_is_delivered() {
        let transport = Arc::new(RecordingTransport::new().segment_size(150));
        let host = Arc::new(RecordingHost::new());
        let sms = started(&transport, Arc::new(MemoryStore::new()), &host);

        sms.send("+100", &"x".repeat(300), request());
        let sent = transport.last_send();
        for target in &sent.sent {
            sms.on_broadcast(target.broadcast(OK));
        }
        assert_eq!(host.take().len(), 1);

        sms.on_broadcast(sent.delivered[1].broadcast(OK));
        host.assert_quiet();
        sms.on_broadcast(sent.delivered[0].broadcast(OK));
        assert!(matches!(
            host.take().as_slice(),
            [Notification::Delivered { .. }]
        ));
    }

    #[test]
    fn delivery_failure_is_not_reported_to_the_host() {
        let transport = Arc::new(RecordingTransport::new());
        let host = Arc::new(RecordingHost::new());
        let sms = started(&transport, Arc::new(MemoryStore::new()), &host);

        sms.send("+100", "hello", request());
        let sent = transport.last_send();
        sms.on_broadcast(sent.sent[0].broadcast(OK));
        assert_eq!(host.take().len(), 1);

        sms.on_broadcast(
            sent.delivered[0].broadcast(failure(KnownResultCode::GenericFailure)),
        );
        host.assert_quiet();
        assert_eq!(sms.pending_sends(), 0);
    }

    #[test]
    fn delivery_before_send_success_is_not_reported() {
        let transport = Arc::new(RecordingTransport::new());
        let host = Arc::new(RecordingHost::new());
        let sms = started(&transport, Arc::new(MemoryStore::new()), &host);

        sms.send("+100", "hello", request());
        let sent = transport.last_send();
        sms.on_broadcast(sent.delivered[0].broadcast(OK));
        host.assert_quiet();

        sms.on_broadcast(sent.sent[0].broadcast(failure(KnownResultCode::NullPdu)));
        assert_eq!(
            host.take(),
            vec![Notification::SendFailed {
                error: ErrorCode::Internal,
                request: request(),
            }]
        );
        assert_eq!(sms.pending_sends(), 0);
    }

    #[test]
    fn unknown_result_code_maps_to_unknown() {
        let transport = Arc::new(RecordingTransport::new());
        let host = Arc::new(RecordingHost::new());
        let sms = started(&transport, Arc::new(MemoryStore::new()), &host);

        sms.send("+100", "hello", request());
        let sent = transport.last_send();
        sms.on_broadcast(sent.sent[0].broadcast(ResultCode::new(77)));
        assert_eq!(
            host.take(),
            vec![Notification::SendFailed {
                error: ErrorCode::Unknown,
                request: request(),
            }]
        );
    }

    #[test]
    fn duplicate_and_stray_completions_are_ignored() {
        let transport = Arc::new(RecordingTransport::new().segment_size(150));
        let host = Arc::new(RecordingHost::new());
        let sms = started(&transport, Arc::new(MemoryStore::new()), &host);

        sms.send("+100", &"x".repeat(300), request());
        let sent = transport.last_send();
        for target in &sent.sent {
            sms.on_broadcast(target.broadcast(OK));
        }
        assert_eq!(host.take().len(), 1);

        sms.on_broadcast(sent.sent[0].broadcast(OK));
        host.assert_quiet();
        assert_eq!(
            sms.tracker(sent.sent[0].extras.tracker)
                .unwrap()
                .remaining(Phase::Delivered),
            2
        );

        sms.on_broadcast(Broadcast::Completion {
            phase: Phase::Sent,
            result: OK,
            extras: None,
        });
        sms.on_broadcast(Broadcast::Completion {
            phase: Phase::Sent,
            result: OK,
            extras: Some(BroadcastExtras {
                tracker_id: Some(0),
                ..BroadcastExtras::default()
            }),
        });
        let mut stray = sent.sent[0].clone();
        stray.extras.tracker = TrackerId::new(40);
        sms.on_broadcast(stray.broadcast(OK));
        host.assert_quiet();
        assert_eq!(sms.pending_sends(), 1);
    }

    #[test]
    fn completions_while_stopped_are_dropped() {
        let transport = Arc::new(RecordingTransport::new());
        let host = Arc::new(RecordingHost::new());
        let sms = started(&transport, Arc::new(MemoryStore::new()), &host);

        sms.send("+100", "hello", request());
        let sent = transport.last_send();
        sms.stop();
        sms.on_broadcast(sent.sent[0].broadcast(OK));
        host.assert_quiet();
        assert_eq!(
            sms.tracker(sent.sent[0].extras.tracker)
                .unwrap()
                .remaining(Phase::Sent),
            1
        );
    }

    #[test]
    fn rejected_dispatch_destroys_tracker_and_reports_failure() {
        let transport = Arc::new(RecordingTransport::new().reject_sends());
        let host = Arc::new(RecordingHost::new());
        let sms = started(&transport, Arc::new(MemoryStore::new()), &host);

        sms.send("+100", "hello", request());
        assert_eq!(
            host.take(),
            vec![Notification::SendFailed {
                error: ErrorCode::Unknown,
                request: request(),
            }]
        );
        assert_eq!(sms.pending_sends(), 0);
    }

    #[test]
    fn zero_segments_and_empty_numbers_fail_without_dispatch() {
        let transport = Arc::new(RecordingTransport::new().segment_size(0));
        let host = Arc::new(RecordingHost::new());
        let sms = started(&transport, Arc::new(MemoryStore::new()), &host);

        sms.send("+100", &"x".repeat(200), request());
        sms.send("  ", "hello", request());
        let failures = host.take();
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|notification| matches!(
            notification,
            Notification::SendFailed {
                error: ErrorCode::Unknown,
                ..
            }
        )));
        assert!(transport.sends().is_empty());
        assert_eq!(sms.pending_sends(), 0);
    }

    #[test]
    fn every_target_gets_a_distinct_token() {
        let transport = Arc::new(RecordingTransport::new().segment_size(100));
        let host = Arc::new(RecordingHost::new());
        let sms = started(&transport, Arc::new(MemoryStore::new()), &host);

        sms.send("+100", &"x".repeat(300), request());
        sms.send("+100", "hi", request());
        let mut tokens: Vec<i32> = transport
            .sends()
            .iter()
            .flat_map(|send| send.sent.iter().chain(send.delivered.iter()))
            .map(|target| target.token.as_i32())
            .collect();
        assert_eq!(tokens.len(), 8);
        tokens.sort_unstable();
        tokens.dedup();
        assert_eq!(tokens.len(), 8);
    }

    #[test]
    fn long_bodies_follow_the_configured_limit() {
        let transport = Arc::new(RecordingTransport::new().segment_size(160));
        let host = Arc::new(RecordingHost::new());
        let sms = started(&transport, Arc::new(MemoryStore::new()), &host);

        sms.send("+100", &"x".repeat(160), request());
        assert!(!transport.last_send().multipart);
        sms.send("+100", &"x".repeat(161), request());
        let long = transport.last_send();
        assert!(long.multipart);
        assert_eq!(long.parts.len(), 2);
        assert_eq!(sms.number_of_segments(&"x".repeat(161)), 2);
    }

    #[test]
    fn save_failure_still_reports_success_without_id() {
        let transport = Arc::new(RecordingTransport::new());
        let store = Arc::new(MemoryStore::new());
        store.set_next_id(i64::from(i32::MAX) + 1);
        let host = Arc::new(RecordingHost::new());
        let sms = started(&transport, store, &host);

        sms.send("+100", "hello", request());
        let sent = transport.last_send();
        sms.on_broadcast(sent.sent[0].broadcast(OK));
        sms.on_broadcast(sent.delivered[0].broadcast(OK));
        let notifications = host.take();
        assert!(matches!(
            notifications.as_slice(),
            [
                Notification::SendSucceeded {
                    message_id: None,
                    ..
                },
                Notification::Delivered {
                    message_id: None,
                    ..
                }
            ]
        ));
    }

    #[test]
    fn normalized_numbers_are_sent_in_e164() {
        let transport = Arc::new(RecordingTransport::new());
        let host = Arc::new(RecordingHost::new());
        let sms = crate::testing::builder(&transport, Arc::new(MemoryStore::new()), &host)
            .normalize_numbers(Some(country::Id::RU))
            .build()
            .unwrap();

        sms.send("79251234567", "hello", request());
        assert_eq!(transport.last_send().destination, "+79251234567");

        sms.send("not a number", "hello", request());
        assert!(matches!(
            host.take().as_slice(),
            [Notification::SendFailed {
                error: ErrorCode::Unknown,
                ..
            }]
        ));
        assert_eq!(transport.sends().len(), 1);
    }

    #[test]
    fn completions_before_start_are_dropped() {
        let transport = Arc::new(RecordingTransport::new());
        let host = Arc::new(RecordingHost::new());
        let sms = manager(&transport, Arc::new(MemoryStore::new()), &host);

        sms.send("+100", "hello", request());
        let sent = transport.last_send();
        sms.on_broadcast(sent.sent[0].broadcast(OK));
        host.assert_quiet();

        sms.start().unwrap();
        sms.on_broadcast(sent.sent[0].broadcast(OK));
        assert_eq!(host.take().len(), 1);
    }
}
