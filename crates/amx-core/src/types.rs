pub use amx_schema::{
    Arch, ArtifactFormat, Os, PackageName, Platform, Sha256Digest, Version,
};
