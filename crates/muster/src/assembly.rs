// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Delegate chain assembly — the consumer surface the engine exists for.
//!
//! A module host asks for the delegate chain of one loader: shared library
//! ids resolve through [`DirectLookup`], common library ids through
//! [`CheckedLookup`], provider ids through [`ProviderTracker`]. Each section
//! gets one bounded resolve pass; unmatched ids are logged and simply absent
//! from the chain. Whether a missing link is fatal is the caller's decision,
//! not the assembler's.
//!
//! The assembler itself is the registration owner: if it is dropped while
//! watches are still pending, the cleanup queue deregisters them on the next
//! registration attempt.

use crate::adapters::{CheckedLookup, DirectLookup, ProviderTracker};
use crate::compat::Requirement;
use crate::config::RuntimeOptions;
use crate::engine::resolve;
use crate::lifecycle::{CleanupQueue, WeakHandle};
use crate::registry::{Candidate, CandidateRegistry, LookupById, WatchRegistry};
use std::sync::Arc;

/// Which section of the chain a link came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    SharedLibrary,
    CommonLibrary,
    Provider,
}

/// One resolved link in a delegate chain.
#[derive(Debug, Clone)]
pub struct ChainLink {
    pub role: LinkRole,
    pub candidate: Arc<Candidate>,
}

/// Ordered, possibly partial, delegate chain.
#[derive(Debug, Clone, Default)]
pub struct DelegateChain {
    links: Vec<ChainLink>,
}

impl DelegateChain {
    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Resolved candidate ids, chain order.
    pub fn ids(&self) -> Vec<&str> {
        self.links.iter().map(|l| l.candidate.id()).collect()
    }
}

/// What one loader needs resolved to build its delegate chain.
#[derive(Debug, Clone)]
pub struct ChainRequest {
    /// Resolved by plain id lookup.
    pub shared_libs: Vec<String>,
    /// Resolved by id lookup plus contract check.
    pub common_libs: Vec<String>,
    /// Resolved by tracking the filtered provider stream.
    pub providers: Vec<String>,
    /// Contract the common libraries and providers must satisfy.
    pub requirement: Requirement,
    /// Optional extra filter narrowing the provider stream.
    pub provider_filter: Option<String>,
}

impl ChainRequest {
    /// Empty request with the given requirement.
    pub fn new(requirement: Requirement) -> Self {
        Self {
            shared_libs: Vec::new(),
            common_libs: Vec::new(),
            providers: Vec::new(),
            requirement,
            provider_filter: None,
        }
    }
}

/// Resolves [`ChainRequest`]s against one registry.
pub struct ChainAssembler {
    registry: Arc<CandidateRegistry>,
    cleanup: Arc<CleanupQueue>,
    options: RuntimeOptions,
}

impl ChainAssembler {
    /// Assembler with default options.
    pub fn new(registry: Arc<CandidateRegistry>, cleanup: Arc<CleanupQueue>) -> Arc<Self> {
        Self::with_options(registry, cleanup, RuntimeOptions::new())
    }

    /// Assembler with caller-owned options.
    pub fn with_options(
        registry: Arc<CandidateRegistry>,
        cleanup: Arc<CleanupQueue>,
        options: RuntimeOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            cleanup,
            options,
        })
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Resolve `request` into an ordered, possibly partial, delegate chain.
    ///
    /// Each section shares one deadline; a section's unmatched ids are
    /// warned about and omitted, never fatal to the other sections.
    pub fn assemble(self: &Arc<Self>, request: &ChainRequest) -> DelegateChain {
        let timeout = self.options.default_timeout();
        let owner: WeakHandle<ChainAssembler> = WeakHandle::new(self);
        let lookup = Arc::clone(&self.registry) as Arc<dyn LookupById>;
        let watch = Arc::clone(&self.registry) as Arc<dyn WatchRegistry>;
        let mut links = Vec::new();

        let direct = DirectLookup::new(
            Arc::clone(&lookup),
            Arc::clone(&watch),
            Arc::clone(&self.cleanup),
            owner.clone(),
        );
        for candidate in resolve(
            &request.shared_libs,
            timeout,
            &direct,
            &direct,
            |unmatched| {
                log::warn!("[assembly] {} shared libraries unmatched", unmatched.len());
            },
        ) {
            links.push(ChainLink {
                role: LinkRole::SharedLibrary,
                candidate,
            });
        }

        let checked = CheckedLookup::new(
            Arc::clone(&lookup),
            Arc::clone(&watch),
            Arc::clone(&self.cleanup),
            owner.clone(),
            request.requirement.clone(),
        );
        for candidate in resolve(
            &request.common_libs,
            timeout,
            &checked,
            &checked,
            |unmatched| {
                log::warn!("[assembly] {} common libraries unmatched", unmatched.len());
            },
        ) {
            links.push(ChainLink {
                role: LinkRole::CommonLibrary,
                candidate,
            });
        }

        let mut tracker = ProviderTracker::new(
            watch,
            Arc::clone(&self.cleanup),
            owner,
            request.requirement.clone(),
        );
        if let Some(expression) = &request.provider_filter {
            tracker = tracker.with_filter(expression.clone());
        }
        for candidate in resolve(
            &request.providers,
            timeout,
            &tracker,
            &tracker,
            |unmatched| {
                log::warn!("[assembly] {} providers unmatched", unmatched.len());
            },
        ) {
            links.push(ChainLink {
                role: LinkRole::Provider,
                candidate,
            });
        }

        log::debug!(
            "[assembly] chain assembled: {} links of {} requested",
            links.len(),
            request.shared_libs.len() + request.common_libs.len() + request.providers.len()
        );
        DelegateChain { links }
    }
}
