//! Remote favorites store backed by Supabase's PostgREST API

mod postgrest;

pub use postgrest::{PostgrestConnector, PostgrestFavoriteStore};
