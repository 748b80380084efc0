use core::sync::atomic::{AtomicBool, Ordering};
use std::fmt;
use std::marker::PhantomData;

use wirec_dsa::{CountMinSketch, TopHeavyHitters};

use crate::association::{Association, InboundContext};
use crate::config::{CompressionConfig, KindConfig};
use crate::error::CompressionError;
use crate::kind::CompressionKind;
use crate::ring::TableRing;
use crate::table::{CodeTable, TableVersion};
use crate::value::NodeIdentity;

/// Sizing and protocol limits for one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub max_heavy_hitters: usize,
    pub sketch_depth: usize,
    pub sketch_width: usize,
    pub sketch_seed: u32,
    pub keep_old_tables: usize,
    pub max_resends: u32,
}

impl EngineSettings {
    pub fn for_kind(config: &CompressionConfig, kind: &KindConfig) -> Self {
        Self {
            max_heavy_hitters: kind.max,
            sketch_depth: config.sketch_depth,
            sketch_width: config.sketch_width,
            sketch_seed: 0,
            keep_old_tables: config.keep_old_tables,
            max_resends: config.max_advertisement_resends,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        let config = CompressionConfig::default();
        Self::for_kind(&config, &config.actor_refs)
    }
}

/// Why a table stopped being "next".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cutover {
    Confirmed,
    FirstUse,
    GaveUp,
}

impl fmt::Display for Cutover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cutover::Confirmed => "Confirmed",
            Cutover::FirstUse => "First use confirmed",
            Cutover::GaveUp => "Gave up on",
        })
    }
}

/// Result of one `run_next_advertisement_cycle` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Handshake not finished; nothing to send the table over.
    NoAssociation,
    Quarantined,
    /// Stream idle or no hits since the last cycle.
    Idle,
    Advertised(TableVersion),
    Resent(TableVersion),
    GaveUp(TableVersion),
}

/// Adaptive compression state for one remote origin and one value kind.
///
/// Observes hits, picks heavy hitters, advertises code tables and decodes
/// codes the peer sends back.
///
/// ## Caller contract: single writer
/// Every `&mut self` method must be driven from one processing context (the
/// decode stage of the inbound stream this origin belongs to). There are no
/// internal locks. The only state read across contexts is the `alive` hint,
/// which is atomic.
pub struct OriginCompressionEngine<K: CompressionKind> {
    origin_id: u64,
    sketch: CountMinSketch,
    heavy_hitters: TopHeavyHitters<K::Value>,
    tables: TableRing<K::Value>,
    /// Set by every hit, cleared when a cycle consumes it.
    alive: AtomicBool,
    resend_count: u32,
    max_resends: u32,
    _kind: PhantomData<K>,
}

impl<K: CompressionKind> fmt::Debug for OriginCompressionEngine<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OriginCompressionEngine")
            .field("kind", &K::NAME)
            .field("origin_id", &self.origin_id)
            .field("active", &self.tables.active().version())
            .field("next", &self.tables.next().version())
            .field("pending", &self.tables.pending_version())
            .field("heavy_hitters", &self.heavy_hitters.len())
            .finish()
    }
}

impl<K: CompressionKind> OriginCompressionEngine<K> {
    pub fn new(origin_id: u64, settings: &EngineSettings) -> Result<Self, CompressionError> {
        Ok(Self {
            origin_id,
            sketch: CountMinSketch::new(
                settings.sketch_depth,
                settings.sketch_width,
                settings.sketch_seed,
            )?,
            heavy_hitters: TopHeavyHitters::new(settings.max_heavy_hitters)?,
            tables: TableRing::new(origin_id, settings.keep_old_tables),
            alive: AtomicBool::new(false),
            resend_count: 0,
            max_resends: settings.max_resends,
            _kind: PhantomData,
        })
    }

    pub fn origin_id(&self) -> u64 {
        self.origin_id
    }

    pub fn active_version(&self) -> TableVersion {
        self.tables.active().version()
    }

    pub fn next_version(&self) -> TableVersion {
        self.tables.next().version()
    }

    pub fn pending_advertisement(&self) -> Option<&CodeTable<K::Value>> {
        self.tables.pending()
    }

    /// Retired versions newest first, ending with the disabled sentinel.
    pub fn history_versions(&self) -> Vec<TableVersion> {
        self.tables.history_versions()
    }

    pub fn heavy_hitters(&self) -> impl Iterator<Item = &K::Value> + '_ {
        self.heavy_hitters.iter()
    }

    /// Liveness hint; may be read from another thread.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Records `n` occurrences of `value` from this origin.
    pub fn increment(&mut self, remote: &NodeIdentity, value: &K::Value, n: u64) {
        if !K::should_count(value) {
            return;
        }

        let n = i64::try_from(n).unwrap_or(i64::MAX);
        let promoted = self
            .sketch
            .add(value, n)
            .and_then(|estimate| self.heavy_hitters.update(value, estimate));

        match promoted {
            Ok(_) => {}
            // Estimates never shrink, so the tracker cannot see a decrease.
            Err(e) => tracing::error!(
                "{} compression for {} broke the counting contract: {}",
                K::NAME,
                remote,
                e
            ),
        }
        self.alive.store(true, Ordering::Release);
    }

    /// Resolves `code` sent under `version`.
    ///
    /// - `Ok(None)`: the field was not compressed, or `version` is unknown
    ///   (aged out, or built for an earlier incarnation of this node). The
    ///   latter is logged; the caller must treat the field as unusable.
    /// - `Err(UnknownCompressedId)`: the version is known but the code is not
    ///   in it. Only the current message is affected.
    ///
    /// The first message using the table currently being advertised confirms
    /// it implicitly.
    pub fn decompress(
        &mut self,
        version: TableVersion,
        code: u32,
    ) -> Result<Option<K::Value>, CompressionError> {
        if version.is_disabled() {
            return Ok(None);
        }

        if self.tables.select(version).is_none() && self.tables.is_pending(version) {
            self.cut_over(version, Cutover::FirstUse);
        }

        match self.tables.select(version) {
            Some(table) => match table.get(code) {
                Some(value) => Ok(Some(value.clone())),
                None => Err(CompressionError::UnknownCompressedId {
                    origin_id: self.origin_id,
                    version,
                    code,
                }),
            },
            None => {
                tracing::warn!(
                    "Inbound message from origin [{}] uses unknown {} table version [{}]. \
                     It was built for an earlier incarnation of this node or has already \
                     been discarded. Active [{}], history {:?}",
                    self.origin_id,
                    K::NAME,
                    version,
                    self.tables.active().version(),
                    self.tables.history_versions()
                );
                Ok(None)
            }
        }
    }

    /// Peer acknowledged `version`. Repeated or stale acks are no-ops.
    pub fn confirm_advertisement(&mut self, version: TableVersion) {
        self.cut_over(version, Cutover::Confirmed);
    }

    fn cut_over(&mut self, version: TableVersion, how: Cutover) -> bool {
        match self.tables.pending_version() {
            Some(pending) if pending == version => {
                self.tables.start_using_next();
                self.resend_count = 0;
                tracing::debug!(
                    "{} {} table version [{}] for origin [{}]",
                    how,
                    K::NAME,
                    version,
                    self.origin_id
                );
                true
            }
            Some(pending) => {
                tracing::debug!(
                    "{} {} table version [{}] for origin [{}] ignored, version [{}] in progress",
                    how,
                    K::NAME,
                    version,
                    self.origin_id,
                    pending
                );
                false
            }
            None => false,
        }
    }

    /// Advances the advertisement protocol by one step.
    ///
    /// With nothing in flight: builds and sends a new table if the origin is
    /// reachable, its stream is active and hits arrived since the last cycle.
    /// With a table in flight: resends it, or commits to it after
    /// `max_resends` unanswered resends.
    pub fn run_next_advertisement_cycle<C: InboundContext>(
        &mut self,
        context: &C,
    ) -> Result<CycleOutcome, CompressionError> {
        if let Some(pending) = self.tables.pending() {
            let version = pending.version();
            self.resend_count += 1;

            if self.resend_count > self.max_resends {
                tracing::debug!(
                    "{} advertisement for origin [{}] version [{}] unconfirmed after {} resends",
                    K::NAME,
                    self.origin_id,
                    version,
                    self.max_resends
                );
                self.cut_over(version, Cutover::GaveUp);
                return Ok(CycleOutcome::GaveUp(version));
            }

            tracing::debug!(
                "{} advertisement in progress for origin [{}] version [{}], resending",
                K::NAME,
                self.origin_id,
                version
            );
            if let Some(association) = context.association(self.origin_id) {
                let message = K::advertisement(context.local_address().clone(), pending.clone());
                association.send_control(message);
            }
            return Ok(CycleOutcome::Resent(version));
        }

        let Some(association) = context.association(self.origin_id) else {
            tracing::debug!(
                "No association for origin [{}] yet, not advertising {} table",
                self.origin_id,
                K::NAME
            );
            return Ok(CycleOutcome::NoAssociation);
        };
        if association.is_quarantined(self.origin_id) {
            return Ok(CycleOutcome::Quarantined);
        }
        if !association.is_message_stream_active() || !self.alive.swap(false, Ordering::AcqRel) {
            tracing::trace!(
                "{} table for origin [{}] unchanged, not advertising",
                K::NAME,
                self.origin_id
            );
            return Ok(CycleOutcome::Idle);
        }

        let version = self.tables.next().version();
        let table = K::build_table(self.origin_id, version, self.heavy_hitters.iter());
        let inverse = table.invert()?;
        tracing::debug!(
            "Advertising {} table version [{}] with {} entries to {}",
            K::NAME,
            version,
            table.len(),
            association.remote_address()
        );

        self.tables.begin_advertisement(table.clone(), inverse);
        self.resend_count = 0;
        association.send_control(K::advertisement(context.local_address().clone(), table));
        Ok(CycleOutcome::Advertised(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{ActorRefKind, ManifestKind};
    use crate::protocol::ControlMessage;
    use crate::value::{ActorRef, Manifest};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    struct FakeAssociation {
        remote: NodeIdentity,
        quarantined: Cell<bool>,
        active: Cell<bool>,
        sent: RefCell<Vec<ControlMessage>>,
    }

    impl Association for Rc<FakeAssociation> {
        fn remote_address(&self) -> &NodeIdentity {
            &self.remote
        }
        fn is_quarantined(&self, _origin_id: u64) -> bool {
            self.quarantined.get()
        }
        fn is_message_stream_active(&self) -> bool {
            self.active.get()
        }
        fn send_control(&self, message: ControlMessage) {
            self.sent.borrow_mut().push(message);
        }
    }

    struct FakeContext {
        local: NodeIdentity,
        association: Option<Rc<FakeAssociation>>,
    }

    impl InboundContext for FakeContext {
        type Association = Rc<FakeAssociation>;
        fn local_address(&self) -> &NodeIdentity {
            &self.local
        }
        fn association(&self, _origin_id: u64) -> Option<Rc<FakeAssociation>> {
            self.association.clone()
        }
    }

    fn node(port: u16, origin_id: u64) -> NodeIdentity {
        NodeIdentity::new("sys", ([127, 0, 0, 1], port).into(), origin_id)
    }

    fn context() -> (FakeContext, Rc<FakeAssociation>) {
        let association = Rc::new(FakeAssociation {
            remote: node(2552, 42),
            quarantined: Cell::new(false),
            active: Cell::new(true),
            sent: RefCell::new(Vec::new()),
        });
        let ctx = FakeContext {
            local: node(2551, 1),
            association: Some(association.clone()),
        };
        (ctx, association)
    }

    fn settings() -> EngineSettings {
        EngineSettings {
            max_heavy_hitters: 4,
            sketch_depth: 4,
            sketch_width: 64,
            ..EngineSettings::default()
        }
    }

    fn v(n: u8) -> TableVersion {
        TableVersion::new(n).unwrap()
    }

    fn engine_with_hits() -> OriginCompressionEngine<ActorRefKind> {
        let mut engine = OriginCompressionEngine::new(42, &settings()).unwrap();
        let remote = node(2552, 42);
        for _ in 0..3 {
            engine.increment(&remote, &ActorRef::new("/user/a"), 1);
        }
        engine.increment(&remote, &ActorRef::new("/user/b"), 1);
        engine
    }

    #[test]
    fn test_first_cycle_advertises_next_version() {
        let (ctx, association) = context();
        let mut engine = engine_with_hits();

        let outcome = engine.run_next_advertisement_cycle(&ctx).unwrap();
        assert_eq!(outcome, CycleOutcome::Advertised(v(1)));
        assert_eq!(engine.active_version(), v(0));
        assert_eq!(engine.pending_advertisement().map(|t| t.len()), Some(2));

        let sent = association.sent.borrow();
        match &sent[..] {
            [ControlMessage::ActorRefAdvertisement(adv)] => {
                assert_eq!(adv.from, node(2551, 1));
                assert_eq!(adv.table.origin_id(), 42);
                assert_eq!(adv.table.version(), v(1));
            }
            other => panic!("unexpected control traffic: {other:?}"),
        }
    }

    #[test]
    fn test_explicit_confirmation_is_idempotent() {
        let (ctx, _association) = context();
        let mut engine = engine_with_hits();
        engine.run_next_advertisement_cycle(&ctx).unwrap();

        engine.confirm_advertisement(v(1));
        assert_eq!(engine.active_version(), v(1));
        assert_eq!(engine.next_version(), v(2));
        assert_eq!(engine.history_versions(), vec![v(0), TableVersion::DISABLED]);

        engine.confirm_advertisement(v(1));
        assert_eq!(engine.active_version(), v(1));
        assert_eq!(engine.next_version(), v(2));
        assert_eq!(engine.history_versions(), vec![v(0), TableVersion::DISABLED]);
    }

    #[test]
    fn test_ack_for_other_version_is_ignored() {
        let (ctx, _association) = context();
        let mut engine = engine_with_hits();
        engine.run_next_advertisement_cycle(&ctx).unwrap();

        engine.confirm_advertisement(v(9));
        assert_eq!(engine.active_version(), v(0));
        assert!(engine.pending_advertisement().is_some());
    }

    #[test]
    fn test_first_use_cuts_over() {
        let (ctx, _association) = context();
        let mut engine = engine_with_hits();
        engine.run_next_advertisement_cycle(&ctx).unwrap();
        let pending = engine.pending_advertisement().unwrap().clone();
        let code = pending.get(&ActorRef::new("/user/b")).unwrap();

        let value = engine.decompress(v(1), code).unwrap();
        assert_eq!(value, Some(ActorRef::new("/user/b")));
        assert_eq!(engine.active_version(), v(1));
        assert_eq!(engine.next_version(), v(2));
        assert!(engine.pending_advertisement().is_none());
    }

    #[test]
    fn test_gives_up_after_max_resends() {
        let (ctx, association) = context();
        let mut engine = engine_with_hits();
        assert_eq!(
            engine.run_next_advertisement_cycle(&ctx).unwrap(),
            CycleOutcome::Advertised(v(1))
        );
        for _ in 0..3 {
            assert_eq!(
                engine.run_next_advertisement_cycle(&ctx).unwrap(),
                CycleOutcome::Resent(v(1))
            );
        }
        assert_eq!(
            engine.run_next_advertisement_cycle(&ctx).unwrap(),
            CycleOutcome::GaveUp(v(1))
        );
        assert_eq!(engine.active_version(), v(1));
        assert_eq!(association.sent.borrow().len(), 4);
    }

    #[test]
    fn test_idle_and_unreachable_origins_do_not_advertise() {
        let (mut ctx, association) = context();
        let mut engine: OriginCompressionEngine<ActorRefKind> =
            OriginCompressionEngine::new(42, &settings()).unwrap();

        // No hits yet.
        assert_eq!(engine.run_next_advertisement_cycle(&ctx).unwrap(), CycleOutcome::Idle);

        engine.increment(&node(2552, 42), &ActorRef::new("/user/a"), 1);
        association.active.set(false);
        assert_eq!(engine.run_next_advertisement_cycle(&ctx).unwrap(), CycleOutcome::Idle);

        association.active.set(true);
        association.quarantined.set(true);
        assert_eq!(
            engine.run_next_advertisement_cycle(&ctx).unwrap(),
            CycleOutcome::Quarantined
        );

        ctx.association = None;
        assert_eq!(
            engine.run_next_advertisement_cycle(&ctx).unwrap(),
            CycleOutcome::NoAssociation
        );
        assert!(association.sent.borrow().is_empty());
        assert!(engine.is_alive());
    }

    #[test]
    fn test_alive_flag_is_consumed_by_advertising_cycle() {
        let (ctx, _association) = context();
        let mut engine = engine_with_hits();
        assert!(engine.is_alive());

        engine.run_next_advertisement_cycle(&ctx).unwrap();
        assert!(!engine.is_alive());
        engine.confirm_advertisement(v(1));

        // No new hits: nothing to advertise.
        assert_eq!(engine.run_next_advertisement_cycle(&ctx).unwrap(), CycleOutcome::Idle);
    }

    #[test]
    fn test_unknown_version_soft_fails_and_unknown_code_hard_fails() {
        let (ctx, _association) = context();
        let mut engine = engine_with_hits();
        engine.run_next_advertisement_cycle(&ctx).unwrap();
        engine.confirm_advertisement(v(1));

        assert_eq!(engine.decompress(v(77), 0).unwrap(), None);
        assert_eq!(engine.decompress(TableVersion::DISABLED, 0).unwrap(), None);
        assert!(matches!(
            engine.decompress(v(1), 99),
            Err(CompressionError::UnknownCompressedId { code: 99, .. })
        ));
    }

    #[test]
    fn test_cutover_history_window() {
        let (ctx, _association) = context();
        let mut engine: OriginCompressionEngine<ActorRefKind> =
            OriginCompressionEngine::new(42, &settings()).unwrap();
        let remote = node(2552, 42);
        let a = ActorRef::new("/user/a");

        let mut codes = Vec::new();
        for _ in 0..6 {
            engine.increment(&remote, &a, 1);
            let CycleOutcome::Advertised(version) = engine.run_next_advertisement_cycle(&ctx).unwrap()
            else {
                panic!("expected an advertisement");
            };
            codes.push((version, engine.pending_advertisement().unwrap().get(&a).unwrap()));
            engine.confirm_advertisement(version);
        }

        assert_eq!(engine.active_version(), v(6));
        assert_eq!(
            engine.history_versions(),
            vec![v(5), v(4), v(3), TableVersion::DISABLED]
        );
        for (version, code) in &codes[2..] {
            assert_eq!(engine.decompress(*version, *code).unwrap(), Some(a.clone()));
        }
        for (version, code) in &codes[..2] {
            assert_eq!(engine.decompress(*version, *code).unwrap(), None);
        }
    }

    /// After a full lap of versions, the table in flight still cuts over on
    /// first use even when a longer history was requested.
    #[test]
    fn test_first_use_after_version_wrap_with_long_history() {
        let (ctx, _association) = context();
        let mut engine: OriginCompressionEngine<ActorRefKind> = OriginCompressionEngine::new(
            42,
            &EngineSettings {
                keep_old_tables: 200,
                ..settings()
            },
        )
        .unwrap();
        let remote = node(2552, 42);
        let stale = ActorRef::new("/user/stale");

        for _ in 0..128 {
            engine.increment(&remote, &stale, 1);
            let CycleOutcome::Advertised(version) = engine.run_next_advertisement_cycle(&ctx).unwrap()
            else {
                panic!("expected an advertisement");
            };
            engine.confirm_advertisement(version);
        }
        assert_eq!(engine.active_version(), v(0));

        let fresh = ActorRef::new("/user/fresh");
        engine.increment(&remote, &fresh, 1_000);
        assert_eq!(
            engine.run_next_advertisement_cycle(&ctx).unwrap(),
            CycleOutcome::Advertised(v(1))
        );
        let code = engine.pending_advertisement().unwrap().get(&fresh).unwrap();

        assert_eq!(engine.decompress(v(1), code).unwrap(), Some(fresh));
        assert_eq!(engine.active_version(), v(1));
        assert!(engine.pending_advertisement().is_none());
    }

    #[test]
    fn test_blank_manifests_and_transient_refs_are_ignored() {
        let remote = node(2552, 42);
        let mut manifests: OriginCompressionEngine<ManifestKind> =
            OriginCompressionEngine::new(42, &settings()).unwrap();
        manifests.increment(&remote, &Manifest::new(""), 10);
        manifests.increment(&remote, &Manifest::new("   "), 10);
        assert!(!manifests.is_alive());
        assert_eq!(manifests.heavy_hitters().count(), 0);

        let mut refs: OriginCompressionEngine<ActorRefKind> =
            OriginCompressionEngine::new(42, &settings()).unwrap();
        refs.increment(&remote, &ActorRef::new("/temp/$a"), 10);
        refs.increment(&remote, &ActorRef::new("wirec://sys@host:2552/deadLetters"), 10);
        assert_eq!(refs.heavy_hitters().count(), 0);
    }
}
