// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! RF <-> APRS-IS gateway rules.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use regex::Regex;

use aprs_core::infra::HeardList;
use aprs_core::{is_alias, AprsPacket, PathElement, Position, ReportType};
use aprs_protocol::tnc2;

use crate::config::IgateConfig;

/// Path tokens that forbid gating in either direction.
const NO_GATE_TOKENS: [&str; 3] = ["NOGATE", "RFONLY", "NO_TX"];

pub const CAPABILITIES_QUERY: &str = "?IGATE?";

pub struct Igate {
    cfg: IgateConfig,
    mycall: String,
    always_rf: Option<Regex>,
    own_position: Option<Position>,
    msg_count: AtomicU64,
}

impl Igate {
    pub fn new(
        cfg: IgateConfig,
        mycall: &str,
        own_position: Option<Position>,
    ) -> Result<Self, String> {
        let always_rf = match cfg.always_rf.as_deref() {
            Some(pattern) => Some(
                Regex::new(pattern).map_err(|e| format!("[igate].always_rf: {}", e))?,
            ),
            None => None,
        };
        Ok(Self {
            cfg,
            mycall: mycall.to_ascii_uppercase(),
            always_rf,
            own_position,
            msg_count: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &IgateConfig {
        &self.cfg
    }

    /// Number of packets gated to RF so far.
    pub fn msg_count(&self) -> u64 {
        self.msg_count.load(Ordering::Relaxed)
    }

    fn is_own(&self, call: &str) -> bool {
        call.eq_ignore_ascii_case(&self.mycall)
    }

    /// Should a packet heard on RF go to APRS-IS?
    pub fn gate_to_inet(&self, packet: &AprsPacket) -> bool {
        if !self.cfg.rf_to_inet {
            return false;
        }
        if packet.report_type == ReportType::Query {
            return false;
        }
        if packet.path_has_inet_marker() || packet.path_contains_any(&NO_GATE_TOKENS) {
            return false;
        }
        !self.is_own(&packet.source)
    }

    /// Copy of an RF packet as sent to APRS-IS: `,qAR,MYCALL` appended.
    pub fn inet_copy(&self, packet: &AprsPacket) -> AprsPacket {
        let mut copy = packet.clone();
        copy.channel = None;
        copy.path.push(PathElement::new("qAR", false));
        copy.path.push(PathElement::new(self.mycall.clone(), false));
        copy
    }

    /// Decide whether a packet heard on APRS-IS goes to RF and build the
    /// third-party packet to transmit. `object_pos` is the last known
    /// position of the object the packet describes.
    pub fn gate_to_rf(
        &self,
        packet: &AprsPacket,
        rf_heard: &mut HeardList,
        inet_heard: &mut HeardList,
        object_pos: Option<Position>,
        now: DateTime<Utc>,
    ) -> Option<AprsPacket> {
        if !self.cfg.inet_to_rf || self.is_own(&packet.source) {
            return None;
        }
        let path = match self.message_path(packet, rf_heard, inet_heard, now) {
            Some(path) => path,
            None if self.object_in_range(packet, object_pos) => {
                tnc2::parse_path(&self.cfg.object_path)
            }
            None => return None,
        };
        self.msg_count.fetch_add(1, Ordering::Relaxed);
        Some(self.third_party(packet, path))
    }

    /// Outgoing path when the message rule allows gating.
    fn message_path(
        &self,
        packet: &AprsPacket,
        rf_heard: &mut HeardList,
        inet_heard: &mut HeardList,
        now: DateTime<Utc>,
    ) -> Option<Vec<PathElement>> {
        if packet.path_contains_any(&["TCPXX"]) || packet.path_contains_any(&NO_GATE_TOKENS) {
            return None;
        }
        if rf_heard.contains(&packet.source, now) {
            return None;
        }
        let target = packet
            .msg_to
            .as_deref()
            .filter(|to| rf_heard.contains(to, now))
            .or_else(|| {
                Some(packet.destination.as_str()).filter(|dst| rf_heard.contains(dst, now))
            })?;
        if inet_heard.contains(target, now) && !self.forced_to_rf(packet) {
            return None;
        }
        let heard_path = rf_heard.get(target, now)?.path.clone();
        Some(self.reverse_path(&heard_path))
    }

    fn forced_to_rf(&self, packet: &AprsPacket) -> bool {
        match (&self.always_rf, packet.msg_to.as_deref()) {
            (Some(re), Some(to)) => re.is_match(to),
            _ => false,
        }
    }

    /// Reverse of the path a station was heard with, aliases dropped.
    /// A path that only held aliases falls back to the default path; a
    /// station heard direct is answered direct.
    fn reverse_path(&self, heard: &[PathElement]) -> Vec<PathElement> {
        if heard.is_empty() {
            return Vec::new();
        }
        let reversed: Vec<PathElement> = heard
            .iter()
            .rev()
            .filter(|e| e.digipeated && !is_alias(&e.call))
            .map(|e| PathElement::new(e.call.clone(), false))
            .collect();
        if reversed.is_empty() {
            tnc2::parse_path(&self.cfg.default_path)
        } else {
            reversed
        }
    }

    fn object_in_range(&self, packet: &AprsPacket, object_pos: Option<Position>) -> bool {
        if !self.cfg.gate_objects || packet.report_type != ReportType::Object {
            return false;
        }
        match (self.own_position, object_pos) {
            (Some(own), Some(pos)) => own.distance_km(&pos) <= self.cfg.object_range_km,
            _ => false,
        }
    }

    /// `MYCALL>TOCALL,path:}FROM>TO,TCPIP,MYCALL*:payload`
    fn third_party(&self, packet: &AprsPacket, path: Vec<PathElement>) -> AprsPacket {
        let inner = format!(
            "}}{}>{},TCPIP,{}*:{}",
            packet.source, packet.destination, self.mycall, packet.report
        );
        AprsPacket::new(self.mycall.clone(), self.cfg.tocall.clone(), path, inner)
    }

    /// Reply to a `?IGATE?` query heard on RF.
    pub fn query_reply(&self, packet: &AprsPacket, heard_count: usize) -> Option<AprsPacket> {
        if packet.report_type != ReportType::Query
            || !packet.report.trim_end().eq_ignore_ascii_case(CAPABILITIES_QUERY)
        {
            return None;
        }
        let report = format!(
            "<IGATE,MSG_CNT={},LOC_CNT={}",
            self.msg_count(),
            heard_count
        );
        Some(AprsPacket::new(
            self.mycall.clone(),
            self.cfg.tocall.clone(),
            Vec::new(),
            report,
        ))
    }
}
