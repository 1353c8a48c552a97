// ============================================================================
// Authentication & Authorization
// ============================================================================
//
// - password:  Argon2id hashing (PHC strings, random salt)
// - token:     HS256 JWT issuance and verification
// - principal: the authenticated caller, extracted from `Authorization: Bearer`
// - policy:    role/ownership checks, one exhaustive match per decision
// - service:   registration, staff accounts, login
//
// ============================================================================

mod password;
mod principal;
mod service;
mod token;

pub mod policy;

pub use password::Passwords;
pub use principal::Principal;
pub use service::{AccountView, AuthService, LoginRequest, LoginResponse, NewStaffAccount, RegisterCustomer};
pub use token::{Claims, IssuedToken, TokenIssuer};
