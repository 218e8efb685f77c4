//! The network context: one sequential loop that keeps the link up, holds a
//! broker session, pumps inbound commands into the shared state, fetches
//! weather on its interval and publishes the periodic status record. Every
//! potentially slow operation is wrapped in an explicit timeout and stamps
//! the context heartbeat, so this loop can be slow but never silently hung.
//!
//! On a wedged broker (a long run of failed sessions) the task returns its
//! resources through [`HANDOFF`] and exits; the supervisor respawns it with
//! all transient session state discarded.

use core::fmt::Write as _;
use core::net::Ipv4Addr;

use defmt::{info, warn};
use embassy_executor::Spawner;
use embassy_net::dns::{DnsQueryType, DnsSocket};
use embassy_net::tcp::TcpSocket;
use embassy_net::tcp::client::{TcpClient, TcpClientState};
use embassy_net::{IpAddress, Stack};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer, with_timeout};
use heapless::String;
use reqwless::client::HttpClient;
use reqwless::request::Method;
use rust_mqtt::client::client::MqttClient;
use rust_mqtt::client::client_config::{ClientConfig, MqttVersion};
use rust_mqtt::packet::v5::publish_packet::QualityOfService;
use rust_mqtt::utils::rng_generator::CountingRng;

use pixelclock_core::command::{self, CommandKind, Effect};
use pixelclock_core::status::StatusRecord;
use pixelclock_core::{age_ms, weather};

use crate::config;
use crate::supervisor::{TaskHealth, now_ms};
use crate::wifi::{self, Network, WifiPeripherals};
use crate::SharedStateMutex;

/// Network loop cadence.
const TICK: Duration = Duration::from_millis(100);
/// Backoff after a failed or dropped broker session.
const BROKER_BACKOFF: Duration = Duration::from_millis(500);
/// TCP connect budget for the broker socket.
const BROKER_CONNECT_BUDGET: Duration = Duration::from_secs(5);
/// Weather HTTP budgets: connect and whole-transfer.
const WEATHER_CONNECT_BUDGET: Duration = Duration::from_secs(2);
const WEATHER_TOTAL_BUDGET: Duration = Duration::from_secs(3);
/// Status record cadence.
const STATUS_INTERVAL_MS: u32 = 30_000;
/// Broker keep-alive ping cadence (keep-alive itself is 60 s).
const PING_INTERVAL_MS: u32 = 25_000;
/// Consecutive failed sessions before the task bails out for a respawn.
const MAX_FAILED_SESSIONS: u32 = 40;

/// Resource handoff between bring-up, a bailing task instance and its
/// replacement.
pub static HANDOFF: Channel<CriticalSectionRawMutex, Network, 1> = Channel::new();

/// Raised by the `weather` command for an immediate fetch.
static FETCH_NOW: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// One-shot: brings the radio and stack up, then hands the result to the
/// network task through [`HANDOFF`].
#[embassy_executor::task]
pub async fn bringup_task(
    spawner: Spawner,
    peripherals: WifiPeripherals,
    health: &'static TaskHealth,
) {
    let network = wifi::init(spawner, peripherals, health).await;
    HANDOFF.send(network).await;
}

#[embassy_executor::task]
pub async fn net_task(state: &'static SharedStateMutex, health: &'static TaskHealth) {
    let mut network = HANDOFF.receive().await;
    let bailout = network_loop(&mut network, state, health).await;
    warn!("network context exiting: {}", bailout);
    HANDOFF.send(network).await;
}

#[derive(defmt::Format)]
enum Bailout {
    BrokerUnreachable,
}

async fn network_loop(
    net: &mut Network,
    state: &'static SharedStateMutex,
    health: &'static TaskHealth,
) -> Bailout {
    let mut failed_sessions: u32 = 0;
    loop {
        health.stamp_net();
        if !wifi::bring_link_up(net, health).await {
            Timer::after(TICK).await;
            continue;
        }

        let report = broker_session(net.stack, state, health).await;
        if report.connected {
            failed_sessions = 0;
        } else {
            failed_sessions += 1;
            if failed_sessions >= MAX_FAILED_SESSIONS {
                return Bailout::BrokerUnreachable;
            }
        }
        warn!("broker session ended: {}", report.reason);
        Timer::after(BROKER_BACKOFF).await;
    }
}

struct SessionReport {
    /// Whether the session got past CONNECT + subscriptions.
    connected: bool,
    reason: &'static str,
}

impl SessionReport {
    fn failed(reason: &'static str) -> Self {
        Self {
            connected: false,
            reason,
        }
    }

    fn dropped(reason: &'static str) -> Self {
        Self {
            connected: true,
            reason,
        }
    }
}

async fn broker_session(
    stack: Stack<'static>,
    state: &'static SharedStateMutex,
    health: &'static TaskHealth,
) -> SessionReport {
    let Some(addr) = resolve_host(stack, config::MQTT_HOST).await else {
        return SessionReport::failed("broker address lookup failed");
    };

    let mut rx_buffer = [0u8; 2048];
    let mut tx_buffer = [0u8; 2048];
    let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
    socket.set_timeout(Some(Duration::from_secs(10)));

    health.stamp_net();
    match with_timeout(BROKER_CONNECT_BUDGET, socket.connect((addr, config::MQTT_PORT))).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => return SessionReport::failed("broker TCP connect refused"),
        Err(_) => return SessionReport::failed("broker TCP connect timed out"),
    }
    health.stamp_net();

    let mut mqtt_config: ClientConfig<'_, 5, CountingRng> =
        ClientConfig::new(MqttVersion::MQTTv5, CountingRng(20000));
    mqtt_config.add_client_id(config::MQTT_CLIENT_ID);
    mqtt_config.max_packet_size = 1024;
    mqtt_config.keep_alive = 60;

    let mut recv_buffer = [0u8; 1024];
    let mut write_buffer = [0u8; 1024];
    let mut client = MqttClient::<_, 5, _>::new(
        socket,
        &mut write_buffer,
        1024,
        &mut recv_buffer,
        1024,
        mqtt_config,
    );

    if client.connect_to_broker().await.is_err() {
        return SessionReport::failed("broker CONNECT rejected");
    }
    health.stamp_net();

    // resubscribe everything; a partial set is logged but not fatal
    let mut all_subscribed = true;
    for kind in CommandKind::ALL {
        let mut topic: String<64> = String::new();
        let _ = write!(topic, "{}/{}", config::TOPIC_BASE, kind.suffix());
        if client.subscribe_to_topic(topic.as_str()).await.is_err() {
            warn!("subscribe failed: {}", topic.as_str());
            all_subscribed = false;
        }
    }
    info!(
        "broker connected, all subscriptions up: {}",
        all_subscribed
    );

    let mut last_status_ms: Option<u32> = None;
    let mut last_ping_ms = now_ms();
    let mut last_weather_attempt_ms: Option<u32> = None;

    loop {
        health.stamp_net();
        let now = now_ms();

        if weather_due(state, last_weather_attempt_ms, now).await {
            last_weather_attempt_ms = Some(now);
            fetch_weather(stack, state, health).await;
        }

        if age_ms(now, last_ping_ms) >= PING_INTERVAL_MS {
            if client.send_ping().await.is_err() {
                return SessionReport::dropped("keep-alive ping failed");
            }
            last_ping_ms = now;
        }

        if last_status_ms.is_none_or(|t| age_ms(now, t) >= STATUS_INTERVAL_MS) {
            let record = {
                let guard = state.lock().await;
                StatusRecord::gather(&guard, true)
            };
            let mut status_topic: String<64> = String::new();
            let _ = write!(status_topic, "{}/status", config::TOPIC_BASE);
            let mut buf = [0u8; 128];
            if let Some(json) = record.to_json(&mut buf) {
                if client
                    .send_message(status_topic.as_str(), json, QualityOfService::QoS0, false)
                    .await
                    .is_err()
                {
                    return SessionReport::dropped("status publish failed");
                }
            }
            last_status_ms = Some(now);
        }

        match with_timeout(TICK, client.receive_message()).await {
            // nothing pending this tick
            Err(_) => {}
            Ok(Ok((topic, payload))) => dispatch(state, topic, payload).await,
            Ok(Err(_)) => return SessionReport::dropped("receive failed"),
        }
    }
}

/// Route one inbound publish. Topics outside our suffix set are someone
/// else's traffic and ignored without logging.
async fn dispatch(state: &'static SharedStateMutex, topic: &str, payload: &[u8]) {
    let kind = topic
        .strip_prefix(config::TOPIC_BASE)
        .and_then(|rest| rest.strip_prefix('/'))
        .and_then(CommandKind::from_suffix);
    let Some(kind) = kind else {
        return;
    };

    match command::parse(kind, payload, config::PARSE_MODE) {
        Ok(cmd) => {
            let now = now_ms();
            let effect = {
                let mut guard = state.lock().await;
                command::apply(&mut guard, cmd, now)
            };
            if effect == Some(Effect::FetchWeatherNow) {
                FETCH_NOW.signal(());
            }
        }
        Err(err) => {
            warn!(
                "dropping payload on {} ({} bytes): {}",
                topic,
                payload.len(),
                err
            );
        }
    }
}

/// Whether a weather fetch should run now: explicit request, first run, or
/// interval expiry. Failures do not retry before the next interval.
async fn weather_due(
    state: &'static SharedStateMutex,
    last_attempt_ms: Option<u32>,
    now: u32,
) -> bool {
    if FETCH_NOW.try_take().is_some() {
        return true;
    }
    let interval = state.lock().await.config.weather_update_interval_ms;
    last_attempt_ms.is_none_or(|t| age_ms(now, t) >= interval)
}

#[derive(defmt::Format)]
enum FetchFail {
    Connect,
    ConnectTimeout,
    Request,
    Status(u16),
    Body,
    Parse,
}

async fn fetch_weather(
    stack: Stack<'static>,
    state: &'static SharedStateMutex,
    health: &'static TaskHealth,
) {
    health.stamp_net();

    let mut url: String<224> = String::new();
    if write!(
        url,
        "http://api.openweathermap.org/data/2.5/weather?lat={}&lon={}&appid={}&units=imperial",
        config::WEATHER_LATITUDE,
        config::WEATHER_LONGITUDE,
        config::WEATHER_API_KEY
    )
    .is_err()
    {
        warn!("weather URL does not fit its buffer");
        return;
    }

    let tcp_state: TcpClientState<1, 1024, 1024> = TcpClientState::new();
    let tcp_client = TcpClient::new(stack, &tcp_state);
    let dns = DnsSocket::new(stack);
    let mut http = HttpClient::new(&tcp_client, &dns);
    let mut rx_buf = [0u8; 1536];

    let result = with_timeout(WEATHER_TOTAL_BUDGET, async {
        let mut request = with_timeout(WEATHER_CONNECT_BUDGET, http.request(Method::GET, &url))
            .await
            .map_err(|_| FetchFail::ConnectTimeout)?
            .map_err(|_| FetchFail::Connect)?;
        let response = request.send(&mut rx_buf).await.map_err(|_| FetchFail::Request)?;
        if !response.status.is_successful() {
            return Err(FetchFail::Status(response.status.0));
        }
        let body = response
            .body()
            .read_to_end()
            .await
            .map_err(|_| FetchFail::Body)?;
        weather::parse_response(body).map_err(|_| FetchFail::Parse)
    })
    .await;

    match result {
        Ok(Ok(reading)) => {
            let now = now_ms();
            let mut guard = state.lock().await;
            guard.weather.apply(reading, now);
            info!(
                "weather: {} at {} F (night icon: {})",
                reading.condition.as_str(),
                reading.temperature_f,
                reading.is_night_icon
            );
        }
        // keep the previous snapshot on any failure
        Ok(Err(err)) => warn!("weather fetch failed: {}", err),
        Err(_) => warn!("weather fetch exceeded its budget"),
    }
    health.stamp_net();
}

async fn resolve_host(stack: Stack<'static>, host: &str) -> Option<IpAddress> {
    if let Ok(addr) = host.parse::<Ipv4Addr>() {
        return Some(IpAddress::Ipv4(addr));
    }
    match stack.dns_query(host, DnsQueryType::A).await {
        Ok(addrs) => addrs.first().copied(),
        Err(_) => {
            warn!("DNS lookup failed for {}", host);
            None
        }
    }
}
