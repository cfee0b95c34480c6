//! Key families, one module per entity.
//!
//! Builders are pure: identical logical input always yields an equal key, and
//! collection inputs are sorted first.

use super::{sorted_ids, KeySegment, QueryKey};

pub mod booking_keys {
    use super::*;

    const ROOT: &str = "bookings";

    pub fn all() -> QueryKey {
        QueryKey::root(ROOT)
    }

    pub fn by_reservation_key(reservation_key: &str) -> QueryKey {
        all().with("reservation").with(reservation_key)
    }

    /// Prefix shared by every per-user booking list.
    pub fn all_by_user() -> QueryKey {
        all().with("user")
    }

    pub fn by_user(user_address: &str) -> QueryKey {
        all_by_user().with(user_address)
    }

    /// Prefix shared by every per-lab booking list.
    pub fn all_by_lab() -> QueryKey {
        all().with("lab")
    }

    pub fn by_lab(lab_id: &str) -> QueryKey {
        all_by_lab().with(lab_id)
    }

    pub fn multi_lab<S: AsRef<str>>(lab_ids: &[S]) -> QueryKey {
        all()
            .with("multiLab")
            .with(KeySegment::List(sorted_ids(lab_ids)))
    }

    pub fn user_composed(user_address: &str, include_details: bool) -> QueryKey {
        all()
            .with("userComposed")
            .with(user_address)
            .with(include_details)
    }

    pub fn lab_composed(lab_id: &str, include_metrics: bool) -> QueryKey {
        all()
            .with("labComposed")
            .with(lab_id)
            .with(include_metrics)
    }

    pub fn has_active_booking(user_address: &str) -> QueryKey {
        all().with("hasActiveBooking").with(user_address)
    }

    pub fn reservations_of_token(lab_id: &str) -> QueryKey {
        all().with("reservationsOfToken").with(lab_id)
    }
}

pub mod lab_keys {
    use super::*;

    const ROOT: &str = "labs";

    pub fn all() -> QueryKey {
        QueryKey::root(ROOT)
    }

    pub fn list() -> QueryKey {
        all().with("getAllLabs")
    }

    pub fn by_id(lab_id: &str) -> QueryKey {
        all().with("getLab").with(lab_id)
    }

    pub fn multi<S: AsRef<str>>(lab_ids: &[S]) -> QueryKey {
        all()
            .with("multi")
            .with(KeySegment::List(sorted_ids(lab_ids)))
    }

    pub fn owner_of(lab_id: &str) -> QueryKey {
        all().with("ownerOf").with(lab_id)
    }

    pub fn token_uri(lab_id: &str) -> QueryKey {
        all().with("tokenURI").with(lab_id)
    }

    pub fn is_listed(lab_id: &str) -> QueryKey {
        all().with("isTokenListed").with(lab_id)
    }
}

pub mod user_keys {
    use super::*;

    const ROOT: &str = "users";

    pub fn all() -> QueryKey {
        QueryKey::root(ROOT)
    }

    pub fn by_address(address: &str) -> QueryKey {
        all().with("address").with(address)
    }

    pub fn sso_session() -> QueryKey {
        all().with("ssoSession")
    }

    pub fn is_provider(address: &str) -> QueryKey {
        all().with("isLabProvider").with(address)
    }
}

pub mod provider_keys {
    use super::*;

    const ROOT: &str = "providers";

    pub fn all() -> QueryKey {
        QueryKey::root(ROOT)
    }

    pub fn list() -> QueryKey {
        all().with("getLabProviders")
    }

    pub fn by_address(address: &str) -> QueryKey {
        all().with("address").with(address)
    }

    pub fn name(address: &str) -> QueryKey {
        all().with("name").with(address)
    }
}

pub mod metadata_keys {
    use super::*;

    const ROOT: &str = "metadata";

    pub fn all() -> QueryKey {
        QueryKey::root(ROOT)
    }

    pub fn by_uri(uri: &str) -> QueryKey {
        all().with(uri)
    }
}
