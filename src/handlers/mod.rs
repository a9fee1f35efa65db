// Two security tiers: public (no auth) and protected (session JWT).
pub mod protected;
pub mod public;
