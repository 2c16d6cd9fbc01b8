// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decoding of the AVR's 48-byte status payload into structured fields.
//!
//! The payload is three 16-byte VFD rows, each led by a marker byte and
//! trailed by a zero byte: line 1 text, line 2 text, and an icon bitfield.
//! The icon → mode/channel/speaker/source mappings below are reverse
//! engineered from the front-panel display; where a later firmware/driver
//! revision disagreed with an earlier one about a bit's meaning, the most
//! recent mapping wins (see the ambiguity notes on `surround`).

use crate::error::HifictlError;
use std::collections::BTreeSet;
use std::fmt;

/// One surround/processing mode indicator on the VFD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SurroundMode {
    DolbyDigital,
    DolbyDigitalEx,
    DolbyProLogic,
    DolbyProLogicIi,
    Dolby3Stereo,
    Stereo,
    DolbyHeadphone,
    DolbyVirtual,
    Dts,
    DtsEs,
    Logic7,
    VMax,
    Dsp,
    SevenChStereo,
    FiveChStereo,
    SurrOff,
}

impl SurroundMode {
    /// Long display name, as it would appear on the VFD.
    pub fn long_name(self) -> &'static str {
        match self {
            Self::DolbyDigital => "DOLBY DIGITAL",
            Self::DolbyDigitalEx => "DOLBY DIGITAL EX",
            Self::DolbyProLogic => "DOLBY PRO LOGIC",
            Self::DolbyProLogicIi => "DOLBY PRO LOGIC II",
            Self::Dolby3Stereo => "DOLBY 3 STEREO",
            Self::Stereo => "STEREO",
            Self::DolbyHeadphone => "DOLBY HEADPHONE",
            Self::DolbyVirtual => "DOLBY VIRTUAL",
            Self::Dts => "DTS",
            Self::DtsEs => "DTS ES",
            Self::Logic7 => "LOGIC 7",
            Self::VMax => "VMAX",
            Self::Dsp => "DSP",
            Self::SevenChStereo => "7CH.STEREO",
            Self::FiveChStereo => "5CH.STEREO",
            Self::SurrOff => "SURR.OFF",
        }
    }

    /// Abbreviated 2-4 char name, used when more than a few modes are active.
    pub fn short_name(self) -> &'static str {
        match self {
            Self::DolbyDigital => "DD",
            Self::DolbyDigitalEx => "DDEX",
            Self::DolbyProLogic => "DPL",
            Self::DolbyProLogicIi => "DPL2",
            Self::Dolby3Stereo => "D3S",
            Self::Stereo => "ST",
            Self::DolbyHeadphone => "DH",
            Self::DolbyVirtual => "DV",
            Self::Dts => "DTS",
            Self::DtsEs => "DTES",
            Self::Logic7 => "L7",
            Self::VMax => "VMAX",
            Self::Dsp => "DSP",
            Self::SevenChStereo => "7CHS",
            Self::FiveChStereo => "5CHS",
            Self::SurrOff => "SROF",
        }
    }
}

/// A channel present in the decoded input signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    L,
    C,
    R,
    Lfe,
    Sl,
    Sr,
    Sbl,
    Sbr,
}

impl Channel {
    fn label(self) -> &'static str {
        match self {
            Self::L => "L",
            Self::C => "C",
            Self::R => "R",
            Self::Lfe => "LFE",
            Self::Sl => "SL",
            Self::Sr => "SR",
            Self::Sbl => "SBL",
            Self::Sbr => "SBR",
        }
    }
}

/// One physical speaker slot, carrying whether it was reported large or small.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SpeakerSlot {
    L(Size),
    C(Size),
    R(Size),
    Lfe,
    Sl(Size),
    Sr(Size),
    Sbl(Size),
    Sbr(Size),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Size {
    Large,
    Small,
}

impl SpeakerSlot {
    fn label(self) -> String {
        match self {
            Self::L(Size::Large) => "L".into(),
            Self::L(Size::Small) => "l".into(),
            Self::C(Size::Large) => "C".into(),
            Self::C(Size::Small) => "c".into(),
            Self::R(Size::Large) => "R".into(),
            Self::R(Size::Small) => "r".into(),
            Self::Lfe => "LFE".into(),
            Self::Sl(Size::Large) => "SL".into(),
            Self::Sl(Size::Small) => "sl".into(),
            Self::Sr(Size::Large) => "SR".into(),
            Self::Sr(Size::Small) => "sr".into(),
            Self::Sbl(Size::Large) => "SBL".into(),
            Self::Sbl(Size::Small) => "sbl".into(),
            Self::Sbr(Size::Large) => "SBR".into(),
            Self::Sbr(Size::Small) => "sbr".into(),
        }
    }

    fn is_lfe(self) -> bool {
        matches!(self, Self::Lfe)
    }
}

/// The currently selected input source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceTag {
    Dvd,
    Cd,
    Tape,
    SixCh,
    EightCh,
    Vid1,
    Vid2,
    Vid3,
    Vid4,
    Fm,
    Am,
}

impl SourceTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dvd => "DVD",
            Self::Cd => "CD",
            Self::Tape => "TAPE",
            Self::SixCh => "6CH",
            Self::EightCh => "8CH",
            Self::Vid1 => "VID1",
            Self::Vid2 => "VID2",
            Self::Vid3 => "VID3",
            Self::Vid4 => "VID4",
            Self::Fm => "FM",
            Self::Am => "AM",
        }
    }
}

/// A single parsed AVR status update: the two VFD text lines plus the raw
/// 14-byte icon bitfield they were decoded alongside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvrStatus {
    pub line1: String,
    pub line2: String,
    icons: [u8; 14],
}

impl AvrStatus {
    /// Parse the 48-byte status payload (as handed back by
    /// [`crate::proto::datagram::decode`] against [`AVR_PC_STATUS`]).
    ///
    /// [`AVR_PC_STATUS`]: crate::proto::datagram::AVR_PC_STATUS
    pub fn parse(payload: &[u8]) -> Result<Self, HifictlError> {
        if payload.len() != 48 {
            return Err(HifictlError::MalformedStatus {
                reason: format!("expected 48 bytes, got {}", payload.len()),
            });
        }
        if !(payload[0] == 0xF0
            && payload[15] == 0x00
            && payload[16] == 0xF1
            && payload[31] == 0x00
            && payload[32] == 0xF2
            && payload[47] == 0x00)
        {
            return Err(HifictlError::MalformedStatus {
                reason: "missing marker bytes".into(),
            });
        }
        let line1 = decode_vfd_text(&payload[1..15])?;
        let line2 = decode_vfd_text(&payload[17..31])?;
        let mut icons = [0u8; 14];
        icons.copy_from_slice(&payload[33..47]);
        Ok(Self { line1, line2, icons })
    }

    /// All icon bytes zero: the receiver is asleep.
    pub fn standby(&self) -> bool {
        self.icons.iter().all(|b| *b == 0)
    }

    /// The VFD is flashing `MUTE`.
    pub fn muted(&self) -> bool {
        matches!(self.line1.trim(), "MUTE" | "") && self.line2.trim().is_empty()
    }

    /// Current volume in dB, parsed from line 2's `"  VOL NNN dB  "` layout.
    pub fn volume(&self) -> Option<i32> {
        let line = self.line2.trim();
        let rest = line.strip_prefix("VOL ")?;
        let rest = rest.strip_suffix("dB")?;
        rest.trim().parse().ok()
    }

    /// Digital input gate label, parsed as the trimmed suffix of line 1
    /// after a `/`.
    pub fn digital(&self) -> Option<String> {
        let (_, dig) = self.line1.split_once('/')?;
        let dig = dig.trim();
        if dig.is_empty() {
            None
        } else {
            Some(dig.to_string())
        }
    }

    /// Active surround/processing modes, decoded from `icons[0..4]`.
    ///
    /// A handful of bits in this range have disagreeing interpretations
    /// across successive firmware-decoder revisions in the field (most
    /// notably `DSP` vs `5CH.STEREO` both touching bit `0x20` of byte 3 in
    /// some captures). This table follows the most recent revision; the
    /// ambiguous overlap is not asserted by any test.
    pub fn surround(&self) -> BTreeSet<SurroundMode> {
        let buf = &self.icons[0..4];
        let mut ret = BTreeSet::new();
        if buf[0] & 0x20 != 0 {
            ret.insert(SurroundMode::DolbyDigitalEx);
        } else if buf[0] & 0x40 != 0 {
            ret.insert(SurroundMode::DolbyDigital);
        }
        if buf[0] & 0x04 != 0 {
            ret.insert(SurroundMode::DolbyProLogicIi);
        } else if buf[0] & 0x08 != 0 {
            ret.insert(SurroundMode::DolbyProLogic);
        }
        if buf[0] & 0x01 != 0 {
            ret.insert(SurroundMode::Dolby3Stereo);
        }
        if buf[1] & 0x40 != 0 {
            ret.insert(SurroundMode::Stereo);
        }
        if buf[1] & 0x10 != 0 {
            ret.insert(SurroundMode::DolbyHeadphone);
        }
        if buf[1] & 0x04 != 0 {
            ret.insert(SurroundMode::DolbyVirtual);
        }
        if buf[2] & 0x20 != 0 {
            ret.insert(SurroundMode::DtsEs);
        } else if buf[2] & 0x40 != 0 {
            ret.insert(SurroundMode::Dts);
        }
        if buf[2] & 0x08 != 0 {
            ret.insert(SurroundMode::Logic7);
        }
        if buf[2] & 0x02 != 0 {
            ret.insert(SurroundMode::VMax);
        }
        if buf[3] & 0x80 != 0 {
            ret.insert(SurroundMode::Dsp);
        }
        if buf[3] & 0x10 != 0 {
            ret.insert(SurroundMode::SevenChStereo);
        } else if buf[3] & 0x20 != 0 {
            ret.insert(SurroundMode::FiveChStereo);
        }
        if buf[3] & 0x02 != 0 {
            ret.insert(SurroundMode::SurrOff);
        }
        ret
    }

    /// Channels present in the decoded input signal, from `icons[4..8]`.
    pub fn channels(&self) -> BTreeSet<Channel> {
        let buf = &self.icons[4..8];
        let mut ret = BTreeSet::new();
        if buf[0] & 0x20 != 0 {
            ret.insert(Channel::L);
        }
        if buf[0] & 0x02 != 0 {
            ret.insert(Channel::C);
        }
        if buf[1] & 0x20 != 0 {
            ret.insert(Channel::R);
        }
        if buf[1] & 0x04 != 0 {
            ret.insert(Channel::Lfe);
        }
        if buf[2] & 0x80 != 0 {
            ret.insert(Channel::Sl);
        }
        if buf[2] & 0x04 != 0 {
            ret.insert(Channel::Sr);
        }
        if buf[3] & 0x40 != 0 {
            ret.insert(Channel::Sbl);
        }
        if buf[3] & 0x02 != 0 {
            ret.insert(Channel::Sbr);
        }
        ret
    }

    /// Speakers in use (large/small per slot), from `icons[4..8]`.
    pub fn speakers(&self) -> BTreeSet<SpeakerSlot> {
        let buf = &self.icons[4..8];
        let mut ret = BTreeSet::new();
        if buf[0] & 0x80 != 0 {
            ret.insert(SpeakerSlot::L(Size::Large));
        } else if buf[0] & 0x40 != 0 {
            ret.insert(SpeakerSlot::L(Size::Small));
        }
        if buf[0] & 0x08 != 0 {
            ret.insert(SpeakerSlot::C(Size::Large));
        } else if buf[0] & 0x04 != 0 {
            ret.insert(SpeakerSlot::C(Size::Small));
        }
        if buf[1] & 0x80 != 0 {
            ret.insert(SpeakerSlot::R(Size::Large));
        } else if buf[1] & 0x40 != 0 {
            ret.insert(SpeakerSlot::R(Size::Small));
        }
        if buf[1] & 0x08 != 0 {
            ret.insert(SpeakerSlot::Lfe);
        }
        if buf[1] & 0x02 != 0 {
            ret.insert(SpeakerSlot::Sl(Size::Large));
        } else if buf[1] & 0x01 != 0 {
            ret.insert(SpeakerSlot::Sl(Size::Small));
        }
        if buf[2] & 0x10 != 0 {
            ret.insert(SpeakerSlot::Sr(Size::Large));
        } else if buf[2] & 0x08 != 0 {
            ret.insert(SpeakerSlot::Sr(Size::Small));
        }
        if buf[3] & 0x20 != 0 {
            ret.insert(SpeakerSlot::Sbl(Size::Large));
        } else if buf[3] & 0x80 != 0 {
            ret.insert(SpeakerSlot::Sbl(Size::Small));
        }
        if buf[3] & 0x01 != 0 {
            ret.insert(SpeakerSlot::Sbr(Size::Large));
        } else if buf[3] & 0x04 != 0 {
            ret.insert(SpeakerSlot::Sbr(Size::Small));
        }
        ret
    }

    /// Selected input source, from `icons[8..12]`. Mutually exclusive in
    /// steady state; during boot (or standby) multiple bits may be set, in
    /// which case `None` is returned.
    pub fn source(&self) -> Option<SourceTag> {
        let buf = &self.icons[8..12];
        let mut ret = BTreeSet::new();
        if buf[0] & 0x30 != 0 {
            ret.insert(SourceTag::Dvd);
        }
        if buf[1] & 0xC0 != 0 {
            ret.insert(SourceTag::Cd);
        }
        if buf[2] & 0x60 != 0 {
            ret.insert(SourceTag::Tape);
        }
        if buf[2] & 0x06 != 0 {
            ret.insert(SourceTag::SixCh);
        }
        if buf[3] & 0x60 != 0 {
            ret.insert(SourceTag::EightCh);
        }
        if buf[0] & 0xC0 != 0 {
            ret.insert(SourceTag::Vid1);
        }
        if buf[0] & 0x03 != 0 {
            ret.insert(SourceTag::Vid2);
        }
        if buf[1] & 0x30 != 0 {
            ret.insert(SourceTag::Vid3);
        }
        if buf[1] & 0x01 != 0 && buf[2] & 0x80 != 0 {
            ret.insert(SourceTag::Vid4);
        }
        if buf[1] & 0x04 != 0 {
            ret.insert(SourceTag::Fm);
        }
        if buf[1] & 0x02 != 0 {
            ret.insert(SourceTag::Am);
        }
        if ret.len() == 1 {
            ret.into_iter().next()
        } else {
            None
        }
    }
}

impl fmt::Display for AvrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<AvrStatus: {:?} {:?} {:?}/{}/{} -> {}>",
            self.line1,
            self.line2,
            self.source(),
            channels_string(&self.channels()),
            surround_string(&self.surround()),
            speakers_string(&self.speakers()),
        )
    }
}

/// Decode 14 raw VFD bytes as ASCII text, reversing the receiver's private
/// byte `0x60` substitution for U+2161 (roman numeral two, used in e.g.
/// "DOLBY PRO LOGIC II").
fn decode_vfd_text(raw: &[u8]) -> Result<String, HifictlError> {
    let mut s = String::with_capacity(raw.len());
    for &b in raw {
        if !b.is_ascii() {
            return Err(HifictlError::MalformedStatus {
                reason: format!("non-ASCII VFD byte {b:#04x}"),
            });
        }
        if b == 0x60 {
            s.push('\u{2161}');
        } else {
            s.push(b as char);
        }
    }
    Ok(s)
}

/// Render a set of surround modes as `+`-joined long names, sorted.
pub fn surround_string(modes: &BTreeSet<SurroundMode>) -> String {
    let mut names: Vec<&str> = modes.iter().map(|m| m.long_name()).collect();
    names.sort_unstable();
    names.join("+")
}

/// Render a set of surround modes as `+`-joined short names, or `"***"` if
/// more than `limit` modes are active at once.
pub fn surround_string_short(modes: &BTreeSet<SurroundMode>, limit: usize) -> String {
    if modes.len() > limit {
        return "***".to_string();
    }
    let mut names: Vec<&str> = modes.iter().map(|m| m.short_name()).collect();
    names.sort_unstable();
    names.join("+")
}

/// Render a set of channels as an `"X.Y"` string (e.g. `"5.1"`, `"7.1"`).
pub fn channels_string(channels: &BTreeSet<Channel>) -> String {
    let lfe = channels.contains(&Channel::Lfe) as usize;
    format!("{}.{}", channels.len() - lfe, lfe)
}

/// Render the channel set as a list of labels, for JSON snapshots.
pub fn channels_labels(channels: &BTreeSet<Channel>) -> Vec<&'static str> {
    channels.iter().map(|c| c.label()).collect()
}

/// Render the surround set as a list of long-name labels, for JSON snapshots.
pub fn surround_labels(modes: &BTreeSet<SurroundMode>) -> Vec<&'static str> {
    modes.iter().map(|m| m.long_name()).collect()
}

/// Render a set of speakers grouped by position (`L/R`, `C`, `LFE`, `SL/SR`,
/// `SBL/SBR`), each group `+`-joined, groups separated by `/`.
pub fn speakers_string(speakers: &BTreeSet<SpeakerSlot>) -> String {
    let groups: [Vec<String>; 5] = [
        speakers
            .iter()
            .filter(|s| matches!(s, SpeakerSlot::L(_) | SpeakerSlot::R(_)))
            .map(|s| s.label())
            .collect(),
        speakers
            .iter()
            .filter(|s| matches!(s, SpeakerSlot::C(_)))
            .map(|s| s.label())
            .collect(),
        speakers.iter().filter(|s| s.is_lfe()).map(|s| s.label()).collect(),
        speakers
            .iter()
            .filter(|s| matches!(s, SpeakerSlot::Sl(_) | SpeakerSlot::Sr(_)))
            .map(|s| s.label())
            .collect(),
        speakers
            .iter()
            .filter(|s| matches!(s, SpeakerSlot::Sbl(_) | SpeakerSlot::Sbr(_)))
            .map(|s| s.label())
            .collect(),
    ];
    groups
        .into_iter()
        .filter(|g| !g.is_empty())
        .map(|mut g| {
            g.sort();
            g.join("+")
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Render the speaker set as a list of labels, for JSON snapshots.
pub fn speakers_labels(speakers: &BTreeSet<SpeakerSlot>) -> Vec<String> {
    speakers.iter().map(|s| s.label()).collect()
}

/// Render a set of speakers as an `"X.Y"` count string.
pub fn speakers_string_short(speakers: &BTreeSet<SpeakerSlot>) -> String {
    let lfe = speakers.iter().any(|s| s.is_lfe()) as usize;
    format!("{}.{}", speakers.len() - lfe, lfe)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_payload(line1: &str, line2: &str, icons: [u8; 14]) -> Vec<u8> {
        assert_eq!(line1.len(), 14);
        assert_eq!(line2.len(), 14);
        let mut data = vec![0xF0];
        data.extend_from_slice(line1.as_bytes());
        data.push(0x00);
        data.push(0xF1);
        data.extend_from_slice(line2.as_bytes());
        data.push(0x00);
        data.push(0xF2);
        data.extend_from_slice(&icons);
        data.push(0x00);
        data
    }

    #[test]
    fn standby_is_all_zero_icons() {
        let payload = make_payload("              ", "              ", [0; 14]);
        let status = AvrStatus::parse(&payload).unwrap();
        assert!(status.standby());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(AvrStatus::parse(&[0u8; 10]).is_err());
    }

    #[test]
    fn rejects_missing_markers() {
        let mut payload = make_payload("              ", "              ", [0; 14]);
        payload[0] = 0x00;
        assert!(AvrStatus::parse(&payload).is_err());
    }

    #[test]
    fn volume_parses_from_line2() {
        let payload = make_payload("DVD           ", "  VOL -14 dB  ", [1; 14]);
        let status = AvrStatus::parse(&payload).unwrap();
        assert_eq!(status.volume(), Some(-14));
    }

    #[test]
    fn volume_is_none_when_not_displayed() {
        let payload = make_payload("DVD           ", "DOLBY DIGITAL ", [1; 14]);
        let status = AvrStatus::parse(&payload).unwrap();
        assert_eq!(status.volume(), None);
    }

    #[test]
    fn digital_parses_suffix_after_slash() {
        let payload = make_payload("DVD /OPT1     ", "              ", [1; 14]);
        let status = AvrStatus::parse(&payload).unwrap();
        assert_eq!(status.digital(), Some("OPT1".to_string()));
    }

    #[test]
    fn muted_when_line1_is_mute_and_line2_blank() {
        let payload = make_payload("MUTE          ", "              ", [1; 14]);
        let status = AvrStatus::parse(&payload).unwrap();
        assert!(status.muted());
    }

    #[test]
    fn roman_numeral_substitution_is_reversible() {
        // byte 0x60 ('`') appears in e.g. "DOLBY PRO LOGIC `" in the raw VFD bytes
        let mut line1 = b"DOLBY PRO LOG ".to_vec();
        line1[13] = 0x60;
        let payload = make_payload(
            std::str::from_utf8(&line1).unwrap(),
            "              ",
            [1; 14],
        );
        let status = AvrStatus::parse(&payload).unwrap();
        assert!(status.line1.ends_with('\u{2161}'));
    }

    /// Scenario E: decode icons[4..8] = [0xA8, 0xAC, 0x84, 0x42] -> full 7.1.
    #[test]
    fn scenario_e_seven_one_channel_decode() {
        let mut icons = [0u8; 14];
        icons[4..8].copy_from_slice(&[0xAA, 0xAC, 0x84, 0x42]);
        let payload = make_payload("DVD           ", "              ", icons);
        let status = AvrStatus::parse(&payload).unwrap();
        let channels = status.channels();
        assert_eq!(
            channels,
            BTreeSet::from([
                Channel::L,
                Channel::C,
                Channel::R,
                Channel::Lfe,
                Channel::Sl,
                Channel::Sr,
                Channel::Sbl,
                Channel::Sbr,
            ])
        );
        assert_eq!(channels_string(&channels), "7.1");
    }

    #[test]
    fn surround_ex_bit_excludes_plain_dolby_digital() {
        let mut icons = [0u8; 14];
        icons[0] = 0xE0; // 0x20 (EX) | 0x40 (DD) | 0x80 (unused)
        let payload = make_payload("DVD           ", "              ", icons);
        let status = AvrStatus::parse(&payload).unwrap();
        let modes = status.surround();
        assert!(modes.contains(&SurroundMode::DolbyDigitalEx));
        assert!(!modes.contains(&SurroundMode::DolbyDigital));
    }

    #[test]
    fn source_none_when_multiple_bits_set_during_boot() {
        let mut icons = [0u8; 14];
        icons[8] = 0xC0; // VID1
        icons[9] = 0xC0; // CD
        let payload = make_payload("DVD           ", "              ", icons);
        let status = AvrStatus::parse(&payload).unwrap();
        assert_eq!(status.source(), None);
    }
}
