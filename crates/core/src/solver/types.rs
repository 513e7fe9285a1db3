//! Types for the solver module.

/// One challenge image together with the text recognized from it.
///
/// Lives for a single solve cycle and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeArtifact {
    /// Raw image bytes as delivered by the surface.
    pub image: Vec<u8>,
    /// Normalized recognized text.
    pub text: String,
}

impl ChallengeArtifact {
    /// An image that has not been recognized yet.
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            image,
            text: String::new(),
        }
    }

    /// Whether `other` shows a different image.
    pub fn differs_from(&self, other: &[u8]) -> bool {
        self.image != other
    }
}
