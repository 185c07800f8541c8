//! The location bridge: method dispatch, permission gating, reply delivery.

use std::fmt;
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::channel::{ErrorCode, METHOD_GET_CURRENT_LOCATION, Outcome, ReplyChannel};
use crate::provider::{FixSource, PositioningProvider};
use crate::{Coordinate, LocationError, PermissionState};

const PENDING_POISONED: &str = "pending reply mutex poisoned";

/// Bridges the `getCurrentLocation` method call to the host device's
/// positioning capability, handling the permission lifecycle transparently.
///
/// At most one request may be outstanding; a request that arrives while the
/// permission prompt is open is rejected with [`ErrorCode::Busy`] and the
/// first caller keeps its reply slot.
pub struct LocationBridge {
    provider: Arc<dyn PositioningProvider>,
    pending: Mutex<Option<Box<dyn ReplyChannel>>>,
}

impl fmt::Debug for LocationBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending = self
            .pending
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false);
        f.debug_struct("LocationBridge")
            .field("pending", &pending)
            .finish()
    }
}

impl LocationBridge {
    /// Create a bridge over the given positioning provider.
    #[must_use]
    pub fn new(provider: Arc<dyn PositioningProvider>) -> Self {
        Self {
            provider,
            pending: Mutex::new(None),
        }
    }

    /// Handle one inbound method call, delivering exactly one reply.
    ///
    /// Unrecognized method names receive `not_implemented` and cause no
    /// permission side effects. For `getCurrentLocation` the reply is
    /// produced synchronously unless the permission state is undetermined,
    /// in which case the reply is parked until the OS delivers its decision
    /// to [`on_permission_decision`](Self::on_permission_decision).
    pub fn handle(&self, method: &str, reply: Box<dyn ReplyChannel>) {
        if method != METHOD_GET_CURRENT_LOCATION {
            reply.not_implemented();
            return;
        }

        if self.pending.lock().expect(PENDING_POISONED).is_some() {
            reply.fail(ErrorCode::Busy, ErrorCode::Busy.default_message());
            return;
        }

        match self.provider.permission_state() {
            Ok(PermissionState::Undetermined) => {
                // Park before prompting so the decision callback always
                // finds the slot occupied. Callbacks arrive on a single
                // event thread, so nothing slips in between the busy check
                // above and this store.
                *self.pending.lock().expect(PENDING_POISONED) = Some(reply);
                if let Err(err) = self.provider.request_permission() {
                    if let Some(parked) = self.take_pending() {
                        parked.fail(ErrorCode::Unknown, &err.to_string());
                    }
                }
            }
            Ok(PermissionState::Denied) => reply.fail(
                ErrorCode::PermissionDenied,
                ErrorCode::PermissionDenied.default_message(),
            ),
            Ok(PermissionState::Granted) => self.deliver_fix(reply),
            Err(err) => reply.fail(ErrorCode::Unknown, &err.to_string()),
        }
    }

    /// Continuation for the OS permission callback.
    ///
    /// Resolves the parked request: a grant triggers the fetch, anything
    /// else terminates the request as a denial. A callback with no pending
    /// request is a no-op.
    pub fn on_permission_decision(&self, state: PermissionState) {
        let Some(reply) = self.take_pending() else {
            debug!("permission decision arrived with no pending request");
            return;
        };

        if state == PermissionState::Granted {
            self.deliver_fix(reply);
        } else {
            reply.fail(
                ErrorCode::PermissionDenied,
                ErrorCode::PermissionDenied.default_message(),
            );
        }
    }

    /// Request the current location and await the single reply.
    ///
    /// Suspends across the permission prompt; there is no timeout, so the
    /// future stays pending for as long as the user leaves the prompt open.
    ///
    /// # Errors
    /// Maps every failure reply onto the matching [`LocationError`].
    pub async fn get_current_location(&self) -> Result<Coordinate, LocationError> {
        let (tx, rx) = async_channel::bounded(1);
        self.handle(METHOD_GET_CURRENT_LOCATION, Box::new(ChannelReply { tx }));

        match rx.recv().await {
            Ok(outcome) => outcome.into_result(),
            Err(err) => Err(LocationError::Unknown(format!(
                "reply channel closed: {err}"
            ))),
        }
    }

    fn deliver_fix(&self, reply: Box<dyn ReplyChannel>) {
        match self.fetch_last_known() {
            Some(coordinate) => reply.succeed(coordinate),
            None => reply.fail(
                ErrorCode::Unavailable,
                ErrorCode::Unavailable.default_message(),
            ),
        }
    }

    /// Read the best cached fix, or `None` when nothing is obtainable.
    ///
    /// Re-checks the permission (it can change between dispatch and fetch),
    /// requires at least one enabled provider, then takes the first fix in
    /// priority order. Never waits for fresh data.
    fn fetch_last_known(&self) -> Option<Coordinate> {
        if self.provider.permission_state() != Ok(PermissionState::Granted) {
            return None;
        }

        if !self.provider.positioning_enabled() {
            warn!("no positioning provider is enabled");
            return None;
        }

        FixSource::PRIORITY
            .into_iter()
            .find_map(|source| self.provider.last_known_fix(source))
    }

    fn take_pending(&self) -> Option<Box<dyn ReplyChannel>> {
        self.pending.lock().expect(PENDING_POISONED).take()
    }
}

/// Reply channel backing the async facade.
struct ChannelReply {
    tx: async_channel::Sender<Outcome>,
}

impl ChannelReply {
    fn send(self, outcome: Outcome) {
        if let Err(err) = self.tx.try_send(outcome) {
            warn!("dropping location reply: {err}");
        }
    }
}

impl ReplyChannel for ChannelReply {
    fn succeed(self: Box<Self>, coordinate: Coordinate) {
        self.send(Outcome::Success(coordinate));
    }

    fn fail(self: Box<Self>, code: ErrorCode, message: &str) {
        self.send(Outcome::Failure {
            code,
            message: message.into(),
        });
    }

    fn not_implemented(self: Box<Self>) {
        self.send(Outcome::NotImplemented);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockProvider {
        states: Mutex<VecDeque<Result<PermissionState, LocationError>>>,
        enabled: AtomicBool,
        fixes: Mutex<HashMap<FixSource, Coordinate>>,
        prompts: AtomicUsize,
        permission_queries: AtomicUsize,
        fix_queries: Mutex<Vec<FixSource>>,
        prompt_fails: AtomicBool,
    }

    impl MockProvider {
        fn with_state(state: PermissionState) -> Arc<Self> {
            let provider = Self::default();
            provider.enabled.store(true, Ordering::SeqCst);
            provider.states.lock().unwrap().push_back(Ok(state));
            Arc::new(provider)
        }

        /// Replace the reported permission state.
        fn set_state(&self, state: Result<PermissionState, LocationError>) {
            let mut states = self.states.lock().unwrap();
            states.clear();
            states.push_back(state);
        }

        /// Queue an additional state; each query consumes one until the
        /// last, which then repeats.
        fn push_state(&self, state: Result<PermissionState, LocationError>) {
            self.states.lock().unwrap().push_back(state);
        }

        fn set_fix(&self, source: FixSource, latitude: f64, longitude: f64) {
            self.fixes.lock().unwrap().insert(
                source,
                Coordinate {
                    latitude,
                    longitude,
                },
            );
        }

        fn fix_queries(&self) -> Vec<FixSource> {
            self.fix_queries.lock().unwrap().clone()
        }
    }

    impl PositioningProvider for MockProvider {
        fn permission_state(&self) -> Result<PermissionState, LocationError> {
            self.permission_queries.fetch_add(1, Ordering::SeqCst);
            let mut states = self.states.lock().unwrap();
            if states.len() > 1 {
                states.pop_front().unwrap()
            } else {
                states.front().cloned().expect("mock has no permission state")
            }
        }

        fn request_permission(&self) -> Result<(), LocationError> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            if self.prompt_fails.load(Ordering::SeqCst) {
                Err(LocationError::Unknown("prompt unavailable".into()))
            } else {
                Ok(())
            }
        }

        fn positioning_enabled(&self) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }

        fn last_known_fix(&self, source: FixSource) -> Option<Coordinate> {
            self.fix_queries.lock().unwrap().push(source);
            self.fixes.lock().unwrap().get(&source).copied()
        }
    }

    #[derive(Clone, Default)]
    struct ReplyLog(Arc<Mutex<Vec<Outcome>>>);

    impl ReplyLog {
        fn channel(&self) -> Box<dyn ReplyChannel> {
            Box::new(RecordingReply(self.clone()))
        }

        fn outcomes(&self) -> Vec<Outcome> {
            self.0.lock().unwrap().clone()
        }
    }

    struct RecordingReply(ReplyLog);

    impl ReplyChannel for RecordingReply {
        fn succeed(self: Box<Self>, coordinate: Coordinate) {
            self.0.0.lock().unwrap().push(Outcome::Success(coordinate));
        }

        fn fail(self: Box<Self>, code: ErrorCode, message: &str) {
            self.0.0.lock().unwrap().push(Outcome::Failure {
                code,
                message: message.into(),
            });
        }

        fn not_implemented(self: Box<Self>) {
            self.0.0.lock().unwrap().push(Outcome::NotImplemented);
        }
    }

    fn failure(code: ErrorCode) -> Outcome {
        Outcome::Failure {
            code,
            message: code.default_message().into(),
        }
    }

    fn coord(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate {
            latitude,
            longitude,
        }
    }

    #[test]
    fn unrecognized_method_is_not_implemented_without_side_effects() {
        let provider = MockProvider::with_state(PermissionState::Granted);
        let bridge = LocationBridge::new(provider.clone());
        let log = ReplyLog::default();

        bridge.handle("startTracking", log.channel());

        assert_eq!(log.outcomes(), vec![Outcome::NotImplemented]);
        assert_eq!(provider.permission_queries.load(Ordering::SeqCst), 0);
        assert_eq!(provider.prompts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn denied_permission_fails_without_querying_providers() {
        let provider = MockProvider::with_state(PermissionState::Denied);
        let bridge = LocationBridge::new(provider.clone());
        let log = ReplyLog::default();

        bridge.handle(METHOD_GET_CURRENT_LOCATION, log.channel());

        assert_eq!(log.outcomes(), vec![failure(ErrorCode::PermissionDenied)]);
        assert!(provider.fix_queries().is_empty());
    }

    #[test]
    fn granted_permission_returns_the_cached_fix() {
        let provider = MockProvider::with_state(PermissionState::Granted);
        provider.set_fix(FixSource::Gps, 40.7128, -74.006);
        let bridge = LocationBridge::new(provider);
        let log = ReplyLog::default();

        bridge.handle(METHOD_GET_CURRENT_LOCATION, log.channel());

        assert_eq!(log.outcomes(), vec![Outcome::Success(coord(40.7128, -74.006))]);
    }

    #[test]
    fn granted_permission_without_any_fix_is_unavailable() {
        let provider = MockProvider::with_state(PermissionState::Granted);
        let bridge = LocationBridge::new(provider.clone());
        let log = ReplyLog::default();

        bridge.handle(METHOD_GET_CURRENT_LOCATION, log.channel());

        assert_eq!(log.outcomes(), vec![failure(ErrorCode::Unavailable)]);
        assert_eq!(
            provider.fix_queries(),
            vec![FixSource::Gps, FixSource::Network, FixSource::Passive]
        );
    }

    #[test]
    fn disabled_positioning_is_unavailable_without_provider_reads() {
        let provider = MockProvider::with_state(PermissionState::Granted);
        provider.enabled.store(false, Ordering::SeqCst);
        provider.set_fix(FixSource::Gps, 1.0, 1.0);
        let bridge = LocationBridge::new(provider.clone());
        let log = ReplyLog::default();

        bridge.handle(METHOD_GET_CURRENT_LOCATION, log.channel());

        assert_eq!(log.outcomes(), vec![failure(ErrorCode::Unavailable)]);
        assert!(provider.fix_queries().is_empty());
    }

    #[test]
    fn gps_fix_wins_over_network_fix() {
        let provider = MockProvider::with_state(PermissionState::Granted);
        provider.set_fix(FixSource::Gps, 1.0, 1.0);
        provider.set_fix(FixSource::Network, 2.0, 2.0);
        let bridge = LocationBridge::new(provider.clone());
        let log = ReplyLog::default();

        bridge.handle(METHOD_GET_CURRENT_LOCATION, log.channel());

        assert_eq!(log.outcomes(), vec![Outcome::Success(coord(1.0, 1.0))]);
        // The scan stops at the first hit.
        assert_eq!(provider.fix_queries(), vec![FixSource::Gps]);
    }

    #[test]
    fn network_fix_is_used_when_gps_has_none() {
        let provider = MockProvider::with_state(PermissionState::Granted);
        provider.set_fix(FixSource::Network, 2.0, 2.0);
        let bridge = LocationBridge::new(provider.clone());
        let log = ReplyLog::default();

        bridge.handle(METHOD_GET_CURRENT_LOCATION, log.channel());

        assert_eq!(log.outcomes(), vec![Outcome::Success(coord(2.0, 2.0))]);
        assert_eq!(
            provider.fix_queries(),
            vec![FixSource::Gps, FixSource::Network]
        );
    }

    #[test]
    fn undetermined_permission_parks_the_request_and_prompts() {
        let provider = MockProvider::with_state(PermissionState::Undetermined);
        provider.set_fix(FixSource::Gps, 1.0, 1.0);
        let bridge = LocationBridge::new(provider.clone());
        let log = ReplyLog::default();

        bridge.handle(METHOD_GET_CURRENT_LOCATION, log.channel());

        assert!(log.outcomes().is_empty());
        assert_eq!(provider.prompts.load(Ordering::SeqCst), 1);

        provider.set_state(Ok(PermissionState::Granted));
        bridge.on_permission_decision(PermissionState::Granted);

        assert_eq!(log.outcomes(), vec![Outcome::Success(coord(1.0, 1.0))]);
    }

    #[test]
    fn denial_decision_fails_the_parked_request() {
        let provider = MockProvider::with_state(PermissionState::Undetermined);
        let bridge = LocationBridge::new(provider);
        let log = ReplyLog::default();

        bridge.handle(METHOD_GET_CURRENT_LOCATION, log.channel());
        bridge.on_permission_decision(PermissionState::Denied);

        assert_eq!(log.outcomes(), vec![failure(ErrorCode::PermissionDenied)]);
    }

    #[test]
    fn decision_without_a_pending_request_is_a_noop() {
        let provider = MockProvider::with_state(PermissionState::Granted);
        let bridge = LocationBridge::new(provider.clone());

        bridge.on_permission_decision(PermissionState::Granted);

        assert_eq!(provider.permission_queries.load(Ordering::SeqCst), 0);
        assert!(provider.fix_queries().is_empty());
    }

    #[test]
    fn second_request_while_pending_is_rejected_busy() {
        let provider = MockProvider::with_state(PermissionState::Undetermined);
        provider.set_fix(FixSource::Gps, 1.0, 1.0);
        let bridge = LocationBridge::new(provider.clone());
        let first = ReplyLog::default();
        let second = ReplyLog::default();

        bridge.handle(METHOD_GET_CURRENT_LOCATION, first.channel());
        bridge.handle(METHOD_GET_CURRENT_LOCATION, second.channel());

        assert!(first.outcomes().is_empty());
        assert_eq!(second.outcomes(), vec![failure(ErrorCode::Busy)]);
        // The prompt fired once, for the first caller only.
        assert_eq!(provider.prompts.load(Ordering::SeqCst), 1);

        provider.set_state(Ok(PermissionState::Granted));
        bridge.on_permission_decision(PermissionState::Granted);

        assert_eq!(first.outcomes(), vec![Outcome::Success(coord(1.0, 1.0))]);
        assert_eq!(second.outcomes(), vec![failure(ErrorCode::Busy)]);
    }

    #[test]
    fn sequential_requests_reply_independently() {
        let provider = MockProvider::with_state(PermissionState::Granted);
        provider.set_fix(FixSource::Gps, 3.0, 4.0);
        let bridge = LocationBridge::new(provider);

        for _ in 0..2 {
            let log = ReplyLog::default();
            bridge.handle(METHOD_GET_CURRENT_LOCATION, log.channel());
            assert_eq!(log.outcomes(), vec![Outcome::Success(coord(3.0, 4.0))]);
        }
    }

    #[test]
    fn permission_revoked_between_dispatch_and_fetch_is_unavailable() {
        let provider = MockProvider::with_state(PermissionState::Granted);
        provider.push_state(Ok(PermissionState::Denied));
        provider.set_fix(FixSource::Gps, 1.0, 1.0);
        let bridge = LocationBridge::new(provider);
        let log = ReplyLog::default();

        bridge.handle(METHOD_GET_CURRENT_LOCATION, log.channel());

        assert_eq!(log.outcomes(), vec![failure(ErrorCode::Unavailable)]);
    }

    #[test]
    fn unknown_permission_state_fails_with_unknown_code() {
        let provider = MockProvider::with_state(PermissionState::Granted);
        provider.set_state(Err(LocationError::Unknown("status 7".into())));
        let bridge = LocationBridge::new(provider);
        let log = ReplyLog::default();

        bridge.handle(METHOD_GET_CURRENT_LOCATION, log.channel());

        assert_eq!(
            log.outcomes(),
            vec![Outcome::Failure {
                code: ErrorCode::Unknown,
                message: "unknown error: status 7".into(),
            }]
        );
    }

    #[test]
    fn prompt_failure_clears_the_slot_and_fails_unknown() {
        let provider = MockProvider::with_state(PermissionState::Undetermined);
        provider.prompt_fails.store(true, Ordering::SeqCst);
        let bridge = LocationBridge::new(provider.clone());
        let log = ReplyLog::default();

        bridge.handle(METHOD_GET_CURRENT_LOCATION, log.channel());

        assert_eq!(
            log.outcomes(),
            vec![Outcome::Failure {
                code: ErrorCode::Unknown,
                message: "unknown error: prompt unavailable".into(),
            }]
        );

        // The slot is free again: the next request is not rejected as busy.
        provider.prompt_fails.store(false, Ordering::SeqCst);
        provider.set_state(Ok(PermissionState::Granted));
        provider.set_fix(FixSource::Gps, 1.0, 1.0);
        let retry = ReplyLog::default();
        bridge.handle(METHOD_GET_CURRENT_LOCATION, retry.channel());
        assert_eq!(retry.outcomes(), vec![Outcome::Success(coord(1.0, 1.0))]);
    }

    #[tokio::test]
    async fn facade_returns_the_fix() {
        let provider = MockProvider::with_state(PermissionState::Granted);
        provider.set_fix(FixSource::Gps, 5.0, 6.0);
        let bridge = LocationBridge::new(provider);

        assert_eq!(bridge.get_current_location().await, Ok(coord(5.0, 6.0)));
    }

    #[tokio::test]
    async fn facade_maps_denial_onto_a_typed_error() {
        let provider = MockProvider::with_state(PermissionState::Denied);
        let bridge = LocationBridge::new(provider);

        assert_eq!(
            bridge.get_current_location().await,
            Err(LocationError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn facade_suspends_until_the_permission_decision() {
        let provider = MockProvider::with_state(PermissionState::Undetermined);
        provider.set_fix(FixSource::Gps, 1.0, 1.0);
        let bridge = Arc::new(LocationBridge::new(provider.clone()));

        let request = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.get_current_location().await }
        });

        while provider.prompts.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        provider.set_state(Ok(PermissionState::Granted));
        bridge.on_permission_decision(PermissionState::Granted);

        assert_eq!(request.await.unwrap(), Ok(coord(1.0, 1.0)));
    }
}
