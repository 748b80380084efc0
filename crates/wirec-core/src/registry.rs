use std::collections::{BTreeSet, HashMap};

use crate::association::{Association, InboundContext};
use crate::config::CompressionConfig;
use crate::engine::{CycleOutcome, EngineSettings, OriginCompressionEngine};
use crate::error::CompressionError;
use crate::kind::{ActorRefKind, CompressionKind, ManifestKind};
use crate::table::TableVersion;
use crate::value::{ActorRef, Manifest, NodeIdentity};

/// Decode-side compression as seen by one inbound stream.
///
/// Written once against this trait, the decode stage works the same whether
/// compression is enabled (`CompressionRegistry`) or not
/// (`NoInboundCompressions`).
pub trait InboundCompressions {
    fn hit_actor_ref(&mut self, origin_id: u64, remote: &NodeIdentity, value: &ActorRef, n: u64);
    fn decompress_actor_ref(
        &mut self,
        origin_id: u64,
        version: TableVersion,
        code: u32,
    ) -> Result<Option<ActorRef>, CompressionError>;
    fn confirm_actor_ref_advertisement(&mut self, origin_id: u64, version: TableVersion);
    fn run_next_actor_ref_advertisement_cycle(&mut self);

    fn hit_manifest(&mut self, origin_id: u64, remote: &NodeIdentity, value: &Manifest, n: u64);
    fn decompress_manifest(
        &mut self,
        origin_id: u64,
        version: TableVersion,
        code: u32,
    ) -> Result<Option<Manifest>, CompressionError>;
    fn confirm_manifest_advertisement(&mut self, origin_id: u64, version: TableVersion);
    fn run_next_manifest_advertisement_cycle(&mut self);

    fn current_origin_ids(&self) -> BTreeSet<u64>;

    /// Drops all state for `origin_id`, including any advertisement in flight.
    fn close(&mut self, origin_id: u64);

    /// Closes every origin whose association was torn down or quarantined.
    /// Origins without an association yet keep their counts.
    /// Returns the closed origin ids.
    fn prune_unreachable(&mut self) -> Vec<u64>;
}

/// Lazily creates one engine per origin and value kind.
pub struct CompressionRegistry<C: InboundContext> {
    context: C,
    actor_ref_settings: EngineSettings,
    manifest_settings: EngineSettings,
    actor_refs: HashMap<u64, OriginCompressionEngine<ActorRefKind>>,
    manifests: HashMap<u64, OriginCompressionEngine<ManifestKind>>,
}

impl<C: InboundContext> CompressionRegistry<C> {
    pub fn new(context: C, config: &CompressionConfig) -> Result<Self, CompressionError> {
        config.validate()?;
        Ok(Self::with_settings(
            context,
            EngineSettings::for_kind(config, &config.actor_refs),
            EngineSettings::for_kind(config, &config.manifests),
        ))
    }

    pub fn with_settings(
        context: C,
        actor_ref_settings: EngineSettings,
        manifest_settings: EngineSettings,
    ) -> Self {
        Self {
            context,
            actor_ref_settings,
            manifest_settings,
            actor_refs: HashMap::new(),
            manifests: HashMap::new(),
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn actor_ref_engine(&self, origin_id: u64) -> Option<&OriginCompressionEngine<ActorRefKind>> {
        self.actor_refs.get(&origin_id)
    }

    pub fn manifest_engine(&self, origin_id: u64) -> Option<&OriginCompressionEngine<ManifestKind>> {
        self.manifests.get(&origin_id)
    }

    /// Runs one cycle on every origin of the kind and reports the outcomes.
    pub fn run_actor_ref_cycles(&mut self) -> Vec<(u64, CycleOutcome)> {
        run_cycles(&mut self.actor_refs, &self.context)
    }

    pub fn run_manifest_cycles(&mut self) -> Vec<(u64, CycleOutcome)> {
        run_cycles(&mut self.manifests, &self.context)
    }
}

fn engine_for<'a, K: CompressionKind>(
    engines: &'a mut HashMap<u64, OriginCompressionEngine<K>>,
    settings: &EngineSettings,
    origin_id: u64,
) -> Option<&'a mut OriginCompressionEngine<K>> {
    use std::collections::hash_map::Entry;

    match engines.entry(origin_id) {
        Entry::Occupied(e) => Some(e.into_mut()),
        Entry::Vacant(e) => match OriginCompressionEngine::new(origin_id, settings) {
            Ok(engine) => {
                tracing::debug!("Tracking {} compression for origin [{}]", K::NAME, origin_id);
                Some(e.insert(engine))
            }
            Err(err) => {
                tracing::error!(
                    "Cannot create {} compression for origin [{}]: {}",
                    K::NAME,
                    origin_id,
                    err
                );
                None
            }
        },
    }
}

/// Values the kind never counts do not register their origin either.
fn hit_in<K: CompressionKind>(
    engines: &mut HashMap<u64, OriginCompressionEngine<K>>,
    settings: &EngineSettings,
    origin_id: u64,
    remote: &NodeIdentity,
    value: &K::Value,
    n: u64,
) {
    if !K::should_count(value) {
        return;
    }
    if let Some(engine) = engine_for(engines, settings, origin_id) {
        engine.increment(remote, value, n);
    }
}

fn decompress_in<K: CompressionKind>(
    engines: &mut HashMap<u64, OriginCompressionEngine<K>>,
    origin_id: u64,
    version: TableVersion,
    code: u32,
) -> Result<Option<K::Value>, CompressionError> {
    match engines.get_mut(&origin_id) {
        Some(engine) => engine.decompress(version, code),
        None => {
            // Nothing was ever advertised to this origin.
            if !version.is_disabled() {
                tracing::warn!(
                    "Compressed {} from untracked origin [{}] (table version [{}])",
                    K::NAME,
                    origin_id,
                    version
                );
            }
            Ok(None)
        }
    }
}

fn run_cycles<K: CompressionKind, C: InboundContext>(
    engines: &mut HashMap<u64, OriginCompressionEngine<K>>,
    context: &C,
) -> Vec<(u64, CycleOutcome)> {
    let mut outcomes = Vec::with_capacity(engines.len());
    for (&origin_id, engine) in engines.iter_mut() {
        match engine.run_next_advertisement_cycle(context) {
            Ok(outcome) => outcomes.push((origin_id, outcome)),
            Err(e) => tracing::error!(
                "{} advertisement cycle for origin [{}] failed: {}",
                K::NAME,
                origin_id,
                e
            ),
        }
    }
    outcomes
}

impl<C: InboundContext> InboundCompressions for CompressionRegistry<C> {
    fn hit_actor_ref(&mut self, origin_id: u64, remote: &NodeIdentity, value: &ActorRef, n: u64) {
        hit_in(&mut self.actor_refs, &self.actor_ref_settings, origin_id, remote, value, n);
    }

    fn decompress_actor_ref(
        &mut self,
        origin_id: u64,
        version: TableVersion,
        code: u32,
    ) -> Result<Option<ActorRef>, CompressionError> {
        decompress_in(&mut self.actor_refs, origin_id, version, code)
    }

    fn confirm_actor_ref_advertisement(&mut self, origin_id: u64, version: TableVersion) {
        if let Some(engine) = self.actor_refs.get_mut(&origin_id) {
            engine.confirm_advertisement(version);
        }
    }

    fn run_next_actor_ref_advertisement_cycle(&mut self) {
        self.run_actor_ref_cycles();
    }

    fn hit_manifest(&mut self, origin_id: u64, remote: &NodeIdentity, value: &Manifest, n: u64) {
        hit_in(&mut self.manifests, &self.manifest_settings, origin_id, remote, value, n);
    }

    fn decompress_manifest(
        &mut self,
        origin_id: u64,
        version: TableVersion,
        code: u32,
    ) -> Result<Option<Manifest>, CompressionError> {
        decompress_in(&mut self.manifests, origin_id, version, code)
    }

    fn confirm_manifest_advertisement(&mut self, origin_id: u64, version: TableVersion) {
        if let Some(engine) = self.manifests.get_mut(&origin_id) {
            engine.confirm_advertisement(version);
        }
    }

    fn run_next_manifest_advertisement_cycle(&mut self) {
        self.run_manifest_cycles();
    }

    fn current_origin_ids(&self) -> BTreeSet<u64> {
        self.actor_refs
            .keys()
            .chain(self.manifests.keys())
            .copied()
            .collect()
    }

    fn close(&mut self, origin_id: u64) {
        let refs = self.actor_refs.remove(&origin_id).is_some();
        let manifests = self.manifests.remove(&origin_id).is_some();
        if refs || manifests {
            tracing::debug!("Closed compression state for origin [{}]", origin_id);
        }
    }

    fn prune_unreachable(&mut self) -> Vec<u64> {
        let gone: Vec<u64> = self
            .current_origin_ids()
            .into_iter()
            .filter(|&origin_id| {
                self.context.is_association_lost(origin_id)
                    || self
                        .context
                        .association(origin_id)
                        .is_some_and(|association| association.is_quarantined(origin_id))
            })
            .collect();
        for &origin_id in &gone {
            self.close(origin_id);
        }
        gone
    }
}

/// Used when compression is switched off. Every call is a no-op and every
/// lookup is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInboundCompressions;

impl InboundCompressions for NoInboundCompressions {
    fn hit_actor_ref(&mut self, _: u64, _: &NodeIdentity, _: &ActorRef, _: u64) {}

    fn decompress_actor_ref(
        &mut self,
        _: u64,
        _: TableVersion,
        _: u32,
    ) -> Result<Option<ActorRef>, CompressionError> {
        Ok(None)
    }

    fn confirm_actor_ref_advertisement(&mut self, _: u64, _: TableVersion) {}

    fn run_next_actor_ref_advertisement_cycle(&mut self) {}

    fn hit_manifest(&mut self, _: u64, _: &NodeIdentity, _: &Manifest, _: u64) {}

    fn decompress_manifest(
        &mut self,
        _: u64,
        _: TableVersion,
        _: u32,
    ) -> Result<Option<Manifest>, CompressionError> {
        Ok(None)
    }

    fn confirm_manifest_advertisement(&mut self, _: u64, _: TableVersion) {}

    fn run_next_manifest_advertisement_cycle(&mut self) {}

    fn current_origin_ids(&self) -> BTreeSet<u64> {
        BTreeSet::new()
    }

    fn close(&mut self, _: u64) {}

    fn prune_unreachable(&mut self) -> Vec<u64> {
        Vec::new()
    }
}

/// Picks the implementation for `config`.
pub fn inbound_compressions<C>(
    context: C,
    config: &CompressionConfig,
) -> Result<Box<dyn InboundCompressions + Send>, CompressionError>
where
    C: InboundContext + Send + 'static,
{
    if !config.enabled {
        tracing::info!("Inbound compression disabled");
        return Ok(Box::new(NoInboundCompressions));
    }
    Ok(Box::new(CompressionRegistry::new(context, config)?))
}
