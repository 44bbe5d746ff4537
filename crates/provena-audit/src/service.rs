//! The verification call: verify a chain, then attach commentary.
//!
//! Insight generation is optional and never fatal.  If the provider fails,
//! the response carries the verification report alone.

use tracing::warn;

use provena_contracts::{
    error::LedgerResult,
    verify::{Insights, VerificationRequest, VerificationResponse},
};
use provena_core::traits::InsightProvider;

use crate::verifier::ChainVerifier;

pub struct VerificationService {
    verifier: ChainVerifier,
    insights: Option<Box<dyn InsightProvider>>,
}

impl VerificationService {
    pub fn new(verifier: ChainVerifier) -> Self {
        Self {
            verifier,
            insights: None,
        }
    }

    pub fn with_insights(mut self, provider: Box<dyn InsightProvider>) -> Self {
        self.insights = Some(provider);
        self
    }

    /// Verify `org_id`'s chain and summarize the result.
    ///
    /// Fails only when the chain cannot be read.
    pub fn verify(&self, org_id: &str) -> LedgerResult<VerificationResponse> {
        let report = self.verifier.verify_chain(org_id)?;

        let insights = match &self.insights {
            Some(provider) => provider.summarize(&report).unwrap_or_else(|e| {
                warn!(
                    organization_id = %org_id,
                    error = %e,
                    "insight generation failed, returning verification only"
                );
                Insights::default()
            }),
            None => Insights::default(),
        };

        Ok(VerificationResponse::new(report, insights))
    }

    /// Handle a `{ "org_id": ... }` request.
    pub fn handle(&self, request: &VerificationRequest) -> LedgerResult<VerificationResponse> {
        self.verify(&request.org_id)
    }
}
