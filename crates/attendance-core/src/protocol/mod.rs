//! Wire protocol of the backend issuance call.
//!
//! The issuer sends one JSON request and receives one JSON response:
//!
//! ```text
//! POST {base_url}{issue_path}
//! { "issuerId": "...", "courseId": "...", "latitude": 37.56,
//!   "longitude": 126.97, "frequencyHz": 19234 }
//!
//! 200 { "success": true,  "linkId": "...", "expiresAt": "2024-05-01T09:10:00Z" }
//! 4xx { "success": false, "error": "Course not found" }
//! ```
//!
//! `messages` holds the serde types plus the rules that turn a raw response
//! into either an [`messages::IssuedLink`] or a classified
//! [`messages::ResponseError`].

pub mod messages;
