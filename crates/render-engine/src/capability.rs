//! AAC encoder selection.

use std::collections::HashSet;

use serde::Serialize;

use crate::command::Encoder;

/// AAC implementation, in descending preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AacEncoder {
    /// Fraunhofer FDK AAC, VBR mode 4.
    FdkAac,
    /// Native encoder with the two-loop coder at 192 kbit/s.
    NativeTwoLoop,
    /// Native encoder at 192 kbit/s with default settings.
    Baseline,
}

impl AacEncoder {
    /// Output arguments selecting this implementation.
    pub fn args(&self) -> Vec<String> {
        let args: &[&str] = match self {
            Self::FdkAac => &["-c:a", "libfdk_aac", "-vbr", "4", "-afterburner", "1"],
            Self::NativeTwoLoop => &["-c:a", "aac", "-b:a", "192k", "-aac_coder", "twoloop"],
            Self::Baseline => &["-c:a", "aac", "-b:a", "192k"],
        };
        args.iter().map(|a| a.to_string()).collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FdkAac => "libfdk_aac",
            Self::NativeTwoLoop => "aac (twoloop)",
            Self::Baseline => "aac",
        }
    }

    /// Pick the best implementation present in a capability listing.
    pub fn from_listing(listing: &str) -> Option<Self> {
        let names = listed_encoders(listing);
        if names.contains("libfdk_aac") {
            Some(Self::FdkAac)
        } else if names.contains("aac") {
            Some(Self::NativeTwoLoop)
        } else {
            None
        }
    }

    /// Probe the encoder's listings, falling back to the baseline.
    ///
    /// The encoder list is consulted first, then the codec list.
    pub async fn detect(encoder: &dyn Encoder) -> Self {
        for args in [["-hide_banner", "-encoders"], ["-hide_banner", "-codecs"]] {
            match encoder.query(&args).await {
                Ok(listing) => {
                    if let Some(found) = Self::from_listing(&listing) {
                        tracing::info!(encoder = found.name(), "Detected AAC encoder");
                        return found;
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, listing = args[1], "Capability listing failed");
                }
            }
        }
        tracing::warn!("No preferred AAC encoder found; using baseline aac");
        Self::Baseline
    }
}

/// Encoder names in an `-encoders` or `-codecs` listing.
///
/// `-encoders` lines are `FLAGS name description`; `-codecs` lines may name
/// implementations as `(encoders: a b )`.
fn listed_encoders(listing: &str) -> HashSet<&str> {
    let mut names = HashSet::new();
    for line in listing.lines() {
        let mut tokens = line.split_whitespace();
        if let (Some(flags), Some(name)) = (tokens.next(), tokens.next()) {
            if flags.len() == 6 && flags.starts_with('A') {
                names.insert(name);
            }
        }
        if let Some(start) = line.find("(encoders:") {
            let rest = &line[start + "(encoders:".len()..];
            let inner = rest.split(')').next().unwrap_or("");
            names.extend(inner.split_whitespace());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENCODERS_NATIVE: &str = "\
Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC
 A....D aac                  AAC (Advanced Audio Coding)
 A....D libmp3lame           libmp3lame MP3 (MPEG audio layer 3)
";

    const ENCODERS_FDK: &str = "\
 ------
 A....D aac                  AAC (Advanced Audio Coding)
 A....D libfdk_aac           Fraunhofer FDK AAC
";

    const CODECS: &str = "\
 DEA.L. aac                  AAC (Advanced Audio Coding) (decoders: aac aac_fixed ) (encoders: aac libfdk_aac )
 DEA.L. mp3                  MP3 (MPEG audio layer 3) (decoders: mp3float mp3 ) (encoders: libmp3lame )
";

    #[test]
    fn test_priority_order() {
        assert_eq!(AacEncoder::from_listing(ENCODERS_FDK), Some(AacEncoder::FdkAac));
        assert_eq!(
            AacEncoder::from_listing(ENCODERS_NATIVE),
            Some(AacEncoder::NativeTwoLoop)
        );
        assert_eq!(AacEncoder::from_listing(CODECS), Some(AacEncoder::FdkAac));
        assert_eq!(AacEncoder::from_listing("nothing useful"), None);
    }

    #[test]
    fn test_substring_is_not_a_match() {
        let listing = " A....D aac_at               AAC (AudioToolbox)\n";
        assert_eq!(AacEncoder::from_listing(listing), None);
    }

    #[test]
    fn test_args() {
        assert_eq!(
            AacEncoder::Baseline.args(),
            vec!["-c:a", "aac", "-b:a", "192k"]
        );
        assert!(AacEncoder::FdkAac.args().contains(&"libfdk_aac".to_string()));
    }
}
