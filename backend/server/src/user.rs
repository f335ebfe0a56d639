//! # Frontend Specifications
//!
//! Client logic/relevant structures.
//!
//! ## Overall Payloads
//!
//! JSON both ways.
//!
//! ### Questions
//! - `GET /api/questions` returns every question with its `active` flag
//! - Only active questions are shown, in the order received
//! - Answers are sent in that same order, one per active question
//!
//! ### Verification
//! - `POST /send-sms` with `{to}`, local numbers such as `0501234567` are accepted
//! - `POST /verify-sms` with `{to, code}`, the provider's `status` is `approved` on success
//! - Provider failures come back as `{error, code}` with status 500
//!
//! ### Voting
//! - `POST /api/vote` with `{phoneNumber, answers}`
//! - Answer tokens are `בעד` (for) and `נגד` (against), anything else counts toward neither
//! - Skipped trailing questions are stored as `לא נענה`
//!
//!
//!
//! ## Flow
//!
//! - Fetch questions on page load
//! - User fills in answers, then enters a phone number
//! - Send code, user types the 6-digit code
//! - Only submit the ballot once the code check is approved
//! - Show a thank-you page on `{success: true}`, the server never fails a well-formed ballot
//!
//!
//!
//! ## Results
//!
//! - `GET /api/results` for the live tally per active question
//! - `GET /api/results/csv` downloads every ballot as `voting-results.csv`
