// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::collections::HashMap;
use std::sync::Arc;

use aprs_core::DynResult;

use super::{Channel, ChannelContext, ComposedChannel, Framing, Role, Transport};
use crate::aprsis;
use crate::config::ChannelConfig;

pub type ChannelFactory = fn(&ChannelConfig, &str, &ChannelContext) -> DynResult<Arc<dyn Channel>>;

/// Channel constructors keyed by type name.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    factories: HashMap<String, ChannelFactory>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a type name (e.g. "kiss-serial").
    pub fn add_class(&mut self, type_name: &str, factory: ChannelFactory) {
        self.factories.insert(normalize_name(type_name), factory);
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.factories.contains_key(&normalize_name(type_name))
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build channel `id` of type `type_name` from its configuration.
    pub fn new_instance(
        &self,
        config: &ChannelConfig,
        type_name: &str,
        id: &str,
        ctx: &ChannelContext,
    ) -> DynResult<Arc<dyn Channel>> {
        let factory = self.factories.get(&normalize_name(type_name)).ok_or_else(|| {
            format!(
                "Unknown channel type: {} (available: {})",
                type_name,
                self.registered_types().join(", ")
            )
        })?;
        factory(config, id, ctx)
    }
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

/// Register the built-in channel types.
pub fn register_builtin_channels_on(registry: &mut ChannelRegistry) {
    registry.add_class("kiss-serial", kiss_serial_factory);
    registry.add_class("tnc2-serial", tnc2_serial_factory);
    registry.add_class("kiss-tcp", kiss_tcp_factory);
    registry.add_class("aprs-is", aprs_is_factory);
}

fn serial_transport(cfg: &ChannelConfig) -> DynResult<Transport> {
    match (&cfg.device, cfg.baud) {
        (Some(device), Some(baud)) => Ok(Transport::Serial {
            device: device.clone(),
            baud,
        }),
        _ => Err(format!("channel '{}' needs device and baud", cfg.id).into()),
    }
}

fn tcp_transport(cfg: &ChannelConfig) -> DynResult<Transport> {
    match (&cfg.host, cfg.port) {
        (Some(host), Some(port)) => Ok(Transport::Tcp {
            host: host.clone(),
            port,
        }),
        _ => Err(format!("channel '{}' needs host and port", cfg.id).into()),
    }
}

fn compose(
    cfg: &ChannelConfig,
    id: &str,
    ctx: &ChannelContext,
    transport: Transport,
    framing: Framing,
    role: Role,
) -> Arc<dyn Channel> {
    Arc::new(ComposedChannel::new(
        id,
        transport,
        framing,
        role,
        cfg.retry.policy(),
        ctx.clone(),
    ))
}

fn kiss_serial_factory(
    cfg: &ChannelConfig,
    id: &str,
    ctx: &ChannelContext,
) -> DynResult<Arc<dyn Channel>> {
    let framing = Framing::Kiss {
        port: cfg.kiss_port,
    };
    Ok(compose(cfg, id, ctx, serial_transport(cfg)?, framing, Role::Rf))
}

fn tnc2_serial_factory(
    cfg: &ChannelConfig,
    id: &str,
    ctx: &ChannelContext,
) -> DynResult<Arc<dyn Channel>> {
    Ok(compose(cfg, id, ctx, serial_transport(cfg)?, Framing::Text, Role::Rf))
}

fn kiss_tcp_factory(
    cfg: &ChannelConfig,
    id: &str,
    ctx: &ChannelContext,
) -> DynResult<Arc<dyn Channel>> {
    let framing = Framing::Kiss {
        port: cfg.kiss_port,
    };
    Ok(compose(cfg, id, ctx, tcp_transport(cfg)?, framing, Role::Rf))
}

fn aprs_is_factory(
    cfg: &ChannelConfig,
    id: &str,
    ctx: &ChannelContext,
) -> DynResult<Arc<dyn Channel>> {
    let callsign = ctx
        .callsign
        .as_deref()
        .ok_or_else(|| format!("channel '{}' needs a callsign for APRS-IS login", id))?;
    let passcode = aprsis::resolve_passcode(callsign, cfg.passcode);
    let login = aprsis::login_line(callsign, passcode, cfg.filter.as_deref());
    Ok(compose(
        cfg,
        id,
        ctx,
        tcp_transport(cfg)?,
        Framing::Text,
        Role::Inet { login },
    ))
}
