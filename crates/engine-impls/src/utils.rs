use adhocsim_core::{
    constants,
    engine::{AddressMap, EngineError, NodeSet},
    params::DeviceParams,
    units::Bytes,
};

/// Hands out addresses in node order from the device's network.
pub(crate) fn assign_addresses(
    nodes: &NodeSet,
    device: &DeviceParams,
) -> Result<AddressMap, EngineError> {
    let addrs = nodes
        .iter()
        .map(|id| device.address_of(id))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| {
            EngineError::Rejected(format!(
                "{} nodes do not fit in {}/{}",
                nodes.nr_nodes(),
                device.ipv4_base,
                device.ipv4_mask
            ))
        })?;
    Ok(AddressMap::new(addrs))
}

/// Checks the MAC settings the way the device model would.
pub(crate) fn check_device(device: &DeviceParams) -> Result<(), EngineError> {
    // The RTS/CTS threshold attribute is a 16-bit value.
    if device.rts_cts_threshold.into_u64() > u64::from(u16::MAX) {
        return Err(EngineError::Rejected(format!(
            "RTS/CTS threshold {} out of range",
            device.rts_cts_threshold
        )));
    }
    Ok(())
}

/// Checks that an echo payload fits in one datagram.
pub(crate) fn check_payload(size: Bytes) -> Result<(), EngineError> {
    if size > constants::MAX_UDP_PAYLOAD {
        return Err(EngineError::Rejected(format!(
            "{size} does not fit in a UDP datagram"
        )));
    }
    Ok(())
}
