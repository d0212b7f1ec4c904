//! # SigBridge Firebase
//! Thin adapters over the Firebase HTTP surfaces: FCM for push delivery,
//! Firestore for the recipient roster. Glue only — the services themselves
//! are external collaborators.

pub mod fcm;
pub mod firestore;

pub use fcm::FcmDispatch;
pub use firestore::FirestoreRecipients;
