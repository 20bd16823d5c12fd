//! BLE link adapter.
//!
//! Implements [`LinkPort`] over the Bluedroid GATT server.  Stack callbacks
//! are translated into [`LinkEvent`]s on a static channel that the run
//! loop drains through [`LinkPort::poll_event`]; reads are answered
//! directly from the [`SampleStore`] in the callback.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid via raw `esp_idf_svc::sys` calls.
//! - **all other targets**: in-memory simulation for host-side tests.
//!
//! ## GATT Service Layout
//!
//! | Attribute     | UUID                                   | Perms          |
//! |---------------|----------------------------------------|----------------|
//! | Service       | `8985ec22-ba8e-4009-8966-7c0d4f25460d` |                |
//! | Sample data   | `2ce00ed4-b48a-4f0f-9dc9-34a71b75526b` | Read + Notify  |
//! | CCCD          | `0x2902`                               | Read + Write   |

#[cfg(target_os = "espidf")]
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
#[cfg(target_os = "espidf")]
use embassy_sync::channel::Channel;
use log::{info, warn};

use crate::app::ports::{AdvertisingParams, ConnHandle, ConnParams, LinkEvent, LinkPort};
use crate::error::{AttError, LinkError};
use crate::link::att::{self, AttributeId};

#[cfg(target_os = "espidf")]
use crate::store::SampleStore;

/// Pending stack callbacks.  Drops the newest on overflow.
const LINK_EVENT_CAP: usize = 8;

#[cfg(target_os = "espidf")]
static LINK_EVENTS: Channel<CriticalSectionRawMutex, LinkEvent, LINK_EVENT_CAP> = Channel::new();

/// ATT MTU before any exchange.
#[cfg(target_os = "espidf")]
const DEFAULT_MTU: u16 = 23;

/// Attribute behind a stack handle.
pub fn attribute_for_handle(handle: u16, data_handle: u16, cccd_handle: u16) -> Option<AttributeId> {
    match handle {
        0 => None,
        h if h == data_handle => Some(AttributeId::SampleData),
        h if h == cccd_handle => Some(AttributeId::SampleDataConfig),
        _ => None,
    }
}

/// Validate a peer write to the stack handle and build the event to queue.
pub fn accept_write(
    attribute: Option<AttributeId>,
    value: &[u8],
) -> Result<LinkEvent, AttError> {
    let attribute = attribute.ok_or(AttError::AttributeNotFound)?;
    att::validate_write(attribute, value)?;
    let mut v = heapless::Vec::new();
    v.extend_from_slice(&value[..value.len().min(crate::app::ports::MAX_WRITE_LEN)])
        .map_err(|_| AttError::InvalidAttributeValueLength)?;
    Ok(LinkEvent::Write { attribute, value: v })
}

#[cfg(target_os = "espidf")]
fn queue(event: LinkEvent) {
    if LINK_EVENTS.try_send(event).is_err() {
        warn!("BLE: link event queue full, event dropped");
    }
}

// ── ESP-IDF BLE static state ──────────────────────────────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures.  These atomics bridge the callback context to the adapter.

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering as AtomicOrdering};

#[cfg(target_os = "espidf")]
static BLE_GATTS_IF: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_DATA_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CCCD_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_MTU: AtomicU32 = AtomicU32::new(DEFAULT_MTU as u32);
#[cfg(target_os = "espidf")]
static BLE_NOTIFY_ENABLED: AtomicBool = AtomicBool::new(false);
/// Raw advertising + scan response configs still outstanding.
#[cfg(target_os = "espidf")]
static BLE_ADV_PENDING: AtomicU8 = AtomicU8::new(0);
#[cfg(target_os = "espidf")]
static BLE_ADV_INTERVAL: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_PEER_BDA: std::sync::Mutex<[u8; 6]> = std::sync::Mutex::new([0; 6]);
#[cfg(target_os = "espidf")]
static BLE_STORE: std::sync::OnceLock<&'static SampleStore> = std::sync::OnceLock::new();

#[cfg(target_os = "espidf")]
fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    t.uuid.uuid128 = uuid.to_le_bytes();
    t
}

#[cfg(target_os = "espidf")]
fn uuid16_to_esp(uuid: u16) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 2;
    t.uuid.uuid16 = uuid;
    t
}

#[cfg(target_os = "espidf")]
fn peer_bda() -> [u8; 6] {
    *BLE_PEER_BDA.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(target_os = "espidf")]
fn handles() -> (u16, u16) {
    (
        BLE_DATA_HANDLE.load(AtomicOrdering::Relaxed) as u16,
        BLE_CCCD_HANDLE.load(AtomicOrdering::Relaxed) as u16,
    )
}

#[cfg(target_os = "espidf")]
unsafe fn start_advertising_now() {
    use esp_idf_svc::sys::*;
    let interval = BLE_ADV_INTERVAL.load(AtomicOrdering::Relaxed) as u16;
    let mut adv_params = esp_ble_adv_params_t {
        adv_int_min: interval,
        adv_int_max: interval,
        adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
        own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
        channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
        adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
        ..unsafe { core::mem::zeroed() }
    };
    let ret = unsafe { esp_ble_gap_start_advertising(&mut adv_params) };
    if ret != ESP_OK as i32 {
        log::error!("BLE GAP: start advertising failed (rc={})", ret);
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_DATA_RAW_SET_COMPLETE_EVT
        | esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_RSP_DATA_RAW_SET_COMPLETE_EVT => {
            if BLE_ADV_PENDING.fetch_sub(1, AtomicOrdering::AcqRel) == 1 {
                unsafe { start_advertising_now() };
            }
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising started");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising stopped");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_UPDATE_CONN_PARAMS_EVT => {
            let p = unsafe { &(*param).update_conn_params };
            if p.status == esp_bt_status_t_ESP_BT_STATUS_SUCCESS {
                queue(LinkEvent::ParamsUpdated(crate::app::ports::ConnParamsReport {
                    interval: p.conn_int,
                    latency: p.latency,
                    supervision_timeout: p.timeout,
                }));
            } else {
                log::warn!("BLE GAP: connection parameter update failed (status={})", p.status);
            }
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe fn respond_read(gatts_if: u8, p: &esp_idf_svc::sys::esp_ble_gatts_cb_param_t_gatts_read_evt_param) {
    use esp_idf_svc::sys::*;
    let (data, cccd) = handles();
    let max_len = (BLE_MTU.load(AtomicOrdering::Relaxed) as usize).saturating_sub(1);
    let result = match attribute_for_handle(p.handle, data, cccd) {
        Some(AttributeId::SampleData) => match BLE_STORE.get() {
            Some(store) => att::read_sample(store, usize::from(p.offset), max_len),
            None => Err(AttError::ReadNotPermitted),
        },
        Some(AttributeId::SampleDataConfig) => att::read_cccd(
            BLE_NOTIFY_ENABLED.load(AtomicOrdering::Relaxed),
            usize::from(p.offset),
            max_len,
        ),
        None => Err(AttError::AttributeNotFound),
    };
    let mut rsp: esp_gatt_rsp_t = unsafe { core::mem::zeroed() };
    let status = match result {
        Ok(bytes) => {
            // SAFETY: attr_value is the only union member used for reads.
            unsafe {
                rsp.attr_value.handle = p.handle;
                rsp.attr_value.offset = p.offset;
                rsp.attr_value.len = bytes.len() as u16;
                rsp.attr_value.value[..bytes.len()].copy_from_slice(&bytes);
            }
            esp_gatt_status_t_ESP_GATT_OK
        }
        Err(e) => esp_gatt_status_t::from(e.code()),
    };
    unsafe { esp_ble_gatts_send_response(gatts_if, p.conn_id, p.trans_id, status, &mut rsp) };
}

#[cfg(target_os = "espidf")]
unsafe fn handle_write(gatts_if: u8, p: &esp_idf_svc::sys::esp_ble_gatts_cb_param_t_gatts_write_evt_param) {
    use esp_idf_svc::sys::*;
    let (data, cccd) = handles();
    let value = unsafe { core::slice::from_raw_parts(p.value, usize::from(p.len)) };
    let result = if p.is_prep || p.offset != 0 {
        Err(AttError::WriteNotPermitted)
    } else {
        accept_write(attribute_for_handle(p.handle, data, cccd), value)
    };
    let status = match result {
        Ok(event) => {
            if let LinkEvent::Write { attribute: AttributeId::SampleDataConfig, value } = &event {
                BLE_NOTIFY_ENABLED.store(att::decode_cccd(value) == Ok(true), AtomicOrdering::Relaxed);
            }
            queue(event);
            esp_gatt_status_t_ESP_GATT_OK
        }
        Err(e) => {
            log::warn!("BLE GATTS: write to handle {} rejected ({})", p.handle, e);
            esp_gatt_status_t::from(e.code())
        }
    };
    if p.need_rsp {
        unsafe { esp_ble_gatts_send_response(gatts_if, p.conn_id, p.trans_id, status, core::ptr::null_mut()) };
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_idf_svc::sys::esp_gatts_cb_event_t,
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
) {
    use esp_idf_svc::sys::*;

    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            BLE_GATTS_IF.store(u32::from(gatts_if), AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: app registered (if={})", gatts_if);
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t { uuid: uuid128_to_esp(crate::link::advert::SERVICE_UUID), inst_id: 0 },
                is_primary: true,
            };
            unsafe { esp_ble_gatts_create_service(gatts_if, &mut svc_id, 6) };
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            let svc_handle = unsafe { (*param).create.service_handle };
            BLE_SVC_HANDLE.store(u32::from(svc_handle), AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: service created (handle={})", svc_handle);
            let mut char_uuid = uuid128_to_esp(crate::link::advert::SAMPLE_CHAR_UUID);
            unsafe {
                esp_ble_gatts_start_service(svc_handle);
                esp_ble_gatts_add_char(
                    svc_handle,
                    &mut char_uuid,
                    ESP_GATT_PERM_READ as esp_gatt_perm_t,
                    (ESP_GATT_CHAR_PROP_BIT_READ | ESP_GATT_CHAR_PROP_BIT_NOTIFY) as esp_gatt_char_prop_t,
                    core::ptr::null_mut(),
                    core::ptr::null_mut(),
                );
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            let handle = unsafe { (*param).add_char.attr_handle };
            BLE_DATA_HANDLE.store(u32::from(handle), AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: sample char (handle={})", handle);
            let svc_handle = BLE_SVC_HANDLE.load(AtomicOrdering::Relaxed) as u16;
            let mut descr_uuid = uuid16_to_esp(crate::link::advert::CCCD_UUID16);
            unsafe {
                esp_ble_gatts_add_char_descr(
                    svc_handle,
                    &mut descr_uuid,
                    (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
                    core::ptr::null_mut(),
                    core::ptr::null_mut(),
                );
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_DESCR_EVT => {
            let handle = unsafe { (*param).add_char_descr.attr_handle };
            BLE_CCCD_HANDLE.store(u32::from(handle), AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: CCCD (handle={}), service ready", handle);
            queue(LinkEvent::StackReady);
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            let p = unsafe { &(*param).connect };
            *BLE_PEER_BDA.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = p.remote_bda;
            BLE_MTU.store(u32::from(DEFAULT_MTU), AtomicOrdering::Relaxed);
            BLE_NOTIFY_ENABLED.store(false, AtomicOrdering::Relaxed);
            queue(LinkEvent::Connected(ConnHandle(p.conn_id)));
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            BLE_NOTIFY_ENABLED.store(false, AtomicOrdering::Relaxed);
            queue(LinkEvent::Disconnected);
        }
        esp_gatts_cb_event_t_ESP_GATTS_MTU_EVT => {
            let mtu = unsafe { (*param).mtu.mtu };
            BLE_MTU.store(u32::from(mtu), AtomicOrdering::Relaxed);
            queue(LinkEvent::MtuExchanged(mtu));
        }
        esp_gatts_cb_event_t_ESP_GATTS_READ_EVT => {
            let p = unsafe { &(*param).read };
            if p.need_rsp {
                unsafe { respond_read(gatts_if, p) };
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            let p = unsafe { &(*param).write };
            unsafe { handle_write(gatts_if, p) };
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// BLE adapter
// ───────────────────────────────────────────────────────────────

/// One recorded call on the simulated stack.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCall {
    StartAdvertising(u16),
    StopAdvertising,
    RequestParams(ConnHandle, ConnParams),
    Notify(ConnHandle, AttributeId, heapless::Vec<u8, { att::MAX_READ_LEN }>),
    Disconnect(ConnHandle),
}

pub struct BleAdapter {
    device_name: heapless::String<24>,
    advertising: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_calls: Vec<SimCall>,
    #[cfg(not(target_os = "espidf"))]
    sim_events: heapless::Deque<LinkEvent, LINK_EVENT_CAP>,
    /// Simulation: force the next notify to fail with this error.
    #[cfg(not(target_os = "espidf"))]
    sim_notify_error: Option<LinkError>,
}

impl BleAdapter {
    pub fn new(device_name: heapless::String<24>) -> Self {
        Self {
            device_name,
            advertising: false,
            #[cfg(not(target_os = "espidf"))]
            sim_calls: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_events: heapless::Deque::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_notify_error: None,
        }
    }

    pub fn is_advertising(&self) -> bool {
        self.advertising
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    // ── Platform-specific ─────────────────────────────────────

    /// Bring up the controller and Bluedroid and register the service.
    /// [`LinkEvent::StackReady`] follows once the attribute table exists.
    #[cfg(target_os = "espidf")]
    pub fn init(&mut self, store: &'static SampleStore) -> Result<(), LinkError> {
        use esp_idf_svc::sys::*;
        let _ = BLE_STORE.set(store);
        unsafe {
            // Release classic BT memory (BLE-only mode saves ~30 KB).
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            let ret = esp_bt_controller_init(&mut bt_cfg);
            if ret != ESP_OK as i32 {
                log::error!("BLE: bt_controller_init failed ({})", ret);
                return Err(LinkError::Rejected(ret));
            }
            let ret = esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE);
            if ret != ESP_OK as i32 {
                log::error!("BLE: bt_controller_enable failed ({})", ret);
                return Err(LinkError::Rejected(ret));
            }
            let ret = esp_bluedroid_init();
            if ret != ESP_OK as i32 {
                log::error!("BLE: bluedroid_init failed ({})", ret);
                return Err(LinkError::Rejected(ret));
            }
            let ret = esp_bluedroid_enable();
            if ret != ESP_OK as i32 {
                log::error!("BLE: bluedroid_enable failed ({})", ret);
                return Err(LinkError::Rejected(ret));
            }

            esp_ble_gap_register_callback(Some(ble_gap_event_handler));
            esp_ble_gatts_register_callback(Some(ble_gatts_event_handler));
            esp_ble_gatts_app_register(0);

            let mut name = self.device_name.clone();
            let _ = name.push('\0');
            esp_ble_gap_set_device_name(name.as_ptr().cast());
        }
        info!("BLE(espidf): Bluedroid up as '{}'", self.device_name);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn init(&mut self) -> Result<(), LinkError> {
        info!("BLE(sim): stack up as '{}'", self.device_name);
        self.sim_inject(LinkEvent::StackReady);
        Ok(())
    }

    /// Simulation: queue a stack callback.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_inject(&mut self, event: LinkEvent) {
        if self.sim_events.push_back(event).is_err() {
            warn!("BLE(sim): event queue full, event dropped");
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_calls(&self) -> &[SimCall] {
        &self.sim_calls
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail_next_notify(&mut self, error: LinkError) {
        self.sim_notify_error = Some(error);
    }
}

// ───────────────────────────────────────────────────────────────
// LinkPort implementation
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl LinkPort for BleAdapter {
    fn start_advertising(&mut self, params: &AdvertisingParams) -> Result<(), LinkError> {
        use esp_idf_svc::sys::*;
        BLE_ADV_INTERVAL.store(u32::from(params.interval), AtomicOrdering::Relaxed);
        BLE_ADV_PENDING.store(2, AtomicOrdering::Release);
        let mut payload = params.payload.clone();
        let mut scan = params.scan_response.clone();
        // SAFETY: both buffers are copied by the stack before returning.
        unsafe {
            let ret = esp_ble_gap_config_adv_data_raw(payload.as_mut_ptr(), payload.len() as u32);
            if ret != ESP_OK as i32 {
                return Err(LinkError::Rejected(ret));
            }
            let ret = esp_ble_gap_config_scan_rsp_data_raw(scan.as_mut_ptr(), scan.len() as u32);
            if ret != ESP_OK as i32 {
                return Err(LinkError::Rejected(ret));
            }
        }
        self.advertising = true;
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), LinkError> {
        self.advertising = false;
        // SAFETY: no arguments; harmless when not advertising.
        let ret = unsafe { esp_idf_svc::sys::esp_ble_gap_stop_advertising() };
        if ret == esp_idf_svc::sys::ESP_OK as i32 { Ok(()) } else { Err(LinkError::Rejected(ret)) }
    }

    fn request_conn_params(&mut self, _handle: ConnHandle, params: &ConnParams) -> Result<(), LinkError> {
        use esp_idf_svc::sys::*;
        let mut req = esp_ble_conn_update_params_t {
            bda: peer_bda(),
            min_int: params.interval_min,
            max_int: params.interval_max,
            latency: params.latency,
            timeout: params.supervision_timeout,
        };
        // SAFETY: the request struct is copied by the stack.
        let ret = unsafe { esp_ble_gap_update_conn_params(&mut req) };
        if ret == ESP_OK as i32 { Ok(()) } else { Err(LinkError::Rejected(ret)) }
    }

    fn notify(&mut self, handle: ConnHandle, attribute: AttributeId, value: &[u8]) -> Result<(), LinkError> {
        use esp_idf_svc::sys::*;
        let (data, cccd) = handles();
        let attr_handle = match attribute {
            AttributeId::SampleData => data,
            AttributeId::SampleDataConfig => cccd,
        };
        if attr_handle == 0 {
            return Err(LinkError::NotConnected);
        }
        let mut buf: heapless::Vec<u8, { att::MAX_READ_LEN }> = heapless::Vec::new();
        buf.extend_from_slice(&value[..value.len().min(att::MAX_READ_LEN)])
            .map_err(|_| LinkError::Rejected(ESP_ERR_INVALID_SIZE as i32))?;
        // SAFETY: the stack copies the value before returning.
        let ret = unsafe {
            esp_ble_gatts_send_indicate(
                BLE_GATTS_IF.load(AtomicOrdering::Relaxed) as u8,
                handle.0,
                attr_handle,
                buf.len() as u16,
                buf.as_mut_ptr(),
                false,
            )
        };
        match ret {
            rc if rc == ESP_OK as i32 => Ok(()),
            rc if rc == ESP_ERR_NO_MEM as i32 => Err(LinkError::Congested),
            rc => Err(LinkError::Rejected(rc)),
        }
    }

    fn disconnect(&mut self, _handle: ConnHandle) -> Result<(), LinkError> {
        let mut bda = peer_bda();
        // SAFETY: the address is copied by the stack.
        let ret = unsafe { esp_idf_svc::sys::esp_ble_gap_disconnect(bda.as_mut_ptr()) };
        if ret == esp_idf_svc::sys::ESP_OK as i32 { Ok(()) } else { Err(LinkError::Rejected(ret)) }
    }

    fn poll_event(&mut self) -> Option<LinkEvent> {
        let event = LINK_EVENTS.try_receive().ok()?;
        if matches!(event, LinkEvent::Connected(_)) {
            // The controller stops advertising on connect.
            self.advertising = false;
        }
        Some(event)
    }
}

#[cfg(not(target_os = "espidf"))]
impl LinkPort for BleAdapter {
    fn start_advertising(&mut self, params: &AdvertisingParams) -> Result<(), LinkError> {
        info!("BLE(sim): advertising '{}'", self.device_name);
        self.advertising = true;
        self.sim_calls.push(SimCall::StartAdvertising(params.interval));
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), LinkError> {
        self.advertising = false;
        self.sim_calls.push(SimCall::StopAdvertising);
        Ok(())
    }

    fn request_conn_params(&mut self, handle: ConnHandle, params: &ConnParams) -> Result<(), LinkError> {
        self.sim_calls.push(SimCall::RequestParams(handle, *params));
        Ok(())
    }

    fn notify(&mut self, handle: ConnHandle, attribute: AttributeId, value: &[u8]) -> Result<(), LinkError> {
        if let Some(e) = self.sim_notify_error.take() {
            return Err(e);
        }
        let mut v = heapless::Vec::new();
        let _ = v.extend_from_slice(&value[..value.len().min(att::MAX_READ_LEN)]);
        self.sim_calls.push(SimCall::Notify(handle, attribute, v));
        Ok(())
    }

    fn disconnect(&mut self, handle: ConnHandle) -> Result<(), LinkError> {
        self.sim_calls.push(SimCall::Disconnect(handle));
        self.sim_inject(LinkEvent::Disconnected);
        Ok(())
    }

    fn poll_event(&mut self) -> Option<LinkEvent> {
        let event = self.sim_events.pop_front()?;
        if matches!(event, LinkEvent::Connected(_)) {
            self.advertising = false;
        }
        Some(event)
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
