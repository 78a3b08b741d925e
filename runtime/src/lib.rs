//! Build-completion engine.
//!
//! Everything the completion step does after the lifecycle has exported an
//! image: reconcile registry credentials, retrieve build metadata from the
//! pushed image's OCI labels, assemble and serialize the build status
//! record, and dispatch image signing.
//!
//! # Flow
//!
//! ```text
//! CredentialSet ──► RemoteMetadataRetriever ──► BuildStatusMetadata
//!                                                      │
//!                                       GzipStatusCodec (persist)
//!                                                      │
//!                                       SigningDispatcher (side channel)
//! ```

pub mod oci;
pub mod report;
pub mod signing;
pub mod status;

pub use oci::{
    BuildpackMetadata, BuiltImage, BuiltImageStack, CredentialSet, FetchedImage, ImageFetcher,
    ImageReference, RegistryAuth, RegistryFetcher, RemoteMetadataRetriever,
};
pub use report::ExportReport;
pub use signing::{signing_requests, BackendKind, SigningBackend, SigningDispatcher, SigningRequest};
pub use status::{BuildStatusMetadata, GzipStatusCodec};
