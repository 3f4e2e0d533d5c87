use async_trait::async_trait;
use pilgrim_core::{StoreError, StoreResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use tracing::{error, warn};

use crate::models::BookingRef;
use crate::repository::BookingRepository;

const ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const DEFAULT_PREFIX: &str = "PLG";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Answers whether a booking reference is already in use.
#[async_trait]
pub trait ReferenceIndex: Send + Sync {
    async fn reference_exists(&self, reference: &BookingRef) -> StoreResult<bool>;
}

#[async_trait]
impl<T: BookingRepository + ?Sized> ReferenceIndex for T {
    async fn reference_exists(&self, reference: &BookingRef) -> StoreResult<bool> {
        Ok(self.find_booking_by_reference(reference).await?.is_some())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("Could not find a free booking reference after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("Booking reference lookup failed: {0}")]
    Store(#[from] StoreError),
}

impl AllocationError {
    pub fn is_transient(&self) -> bool {
        match self {
            AllocationError::Exhausted { .. } => true,
            AllocationError::Store(err) => err.is_transient(),
        }
    }
}

/// Generates `PREFIX-XXXXX` references and checks each candidate against the
/// live store before handing it out.
///
/// The pre-check narrows the race but cannot close it; the unique constraint
/// on the bookings table does that, and the caller retries on
/// `StoreError::DuplicateReference`.
pub struct ReferenceAllocator {
    prefix: String,
    max_attempts: u32,
    rng: Mutex<StdRng>,
}

impl ReferenceAllocator {
    pub fn new(prefix: impl Into<String>, max_attempts: u32) -> Self {
        Self::with_rng(prefix, max_attempts, StdRng::from_entropy())
    }

    /// Deterministic allocator for tests.
    pub fn seeded(prefix: impl Into<String>, max_attempts: u32, seed: u64) -> Self {
        Self::with_rng(prefix, max_attempts, StdRng::seed_from_u64(seed))
    }

    fn with_rng(prefix: impl Into<String>, max_attempts: u32, rng: StdRng) -> Self {
        Self {
            prefix: prefix.into().to_ascii_uppercase(),
            max_attempts: max_attempts.max(1),
            rng: Mutex::new(rng),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// A fresh candidate, not yet checked against the store.
    pub fn candidate(&self) -> BookingRef {
        // The lock is never held across an await.
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let suffix: String = (0..BookingRef::SUFFIX_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        BookingRef::from_parts(&self.prefix, &suffix)
    }

    pub async fn allocate<I>(&self, index: &I) -> Result<BookingRef, AllocationError>
    where
        I: ReferenceIndex + ?Sized,
    {
        for attempt in 1..=self.max_attempts {
            let candidate = self.candidate();
            if !index.reference_exists(&candidate).await? {
                return Ok(candidate);
            }
            warn!(reference = %candidate, attempt, "Booking reference collision, regenerating");
        }
        error!(attempts = self.max_attempts, "Booking reference space exhausted");
        Err(AllocationError::Exhausted {
            attempts: self.max_attempts,
        })
    }
}

impl Default for ReferenceAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, DEFAULT_MAX_ATTEMPTS)
    }
}
