use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::alert::{Recipient, SmtpSettings};
use crate::detect::PERSON_CLASS_ID;
use crate::ingest::CameraConfig;

const DEFAULT_REGION: &str = "Region 234";
const DEFAULT_THRESHOLD: usize = 8;
const DEFAULT_CAMERA: &str = "0";
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_MODEL_PATH: &str = "yolov8n.onnx";
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_CONFIDENCE: f32 = 0.25;
const DEFAULT_IOU: f32 = 0.45;
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 465;
const DEFAULT_SMTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;
const DEFAULT_RECIPIENTS: [(&str, &str); 2] = [
    ("Police Station E2", "police@example.org"),
    ("Central Control Room", "control@example.org"),
];
const REQUIRED_RECIPIENTS: usize = 2;

#[derive(Debug, Deserialize, Default)]
struct StampedeConfigFile {
    region: Option<String>,
    threshold: Option<usize>,
    person_class_id: Option<u32>,
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    smtp: Option<SmtpConfigFile>,
    recipients: Option<Vec<RecipientConfigFile>>,
    alert: Option<AlertConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model_path: Option<String>,
    input_size: Option<u32>,
    confidence: Option<f32>,
    iou: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct SmtpConfigFile {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    sender: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RecipientConfigFile {
    label: String,
    address: String,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    rearm_on_failure: Option<bool>,
    shutdown_grace_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct StampedeConfig {
    pub region: String,
    pub threshold: usize,
    pub person_class_id: u32,
    pub camera: CameraConfig,
    pub detector: DetectorSettings,
    pub smtp: SmtpSettings,
    pub recipients: Vec<Recipient>,
    pub alert: AlertSettings,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// ONNX model path, or `stub://` for the scripted backend.
    pub model_path: String,
    pub input_size: u32,
    pub confidence: f32,
    pub iou: f32,
}

impl DetectorSettings {
    pub fn is_stub(&self) -> bool {
        self.model_path.starts_with("stub://")
    }
}

#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub rearm_on_failure: bool,
    pub shutdown_grace: Duration,
}

impl StampedeConfig {
    /// Load defaults, then the JSON file at `path` (or `STAMPEDE_CONFIG`),
    /// then environment overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("STAMPEDE_CONFIG").ok().map(PathBuf::from));
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: StampedeConfigFile) -> Self {
        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraConfig {
            device: camera_file
                .device
                .unwrap_or_else(|| DEFAULT_CAMERA.to_string()),
            width: camera_file.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
            target_fps: camera_file.target_fps.unwrap_or(0),
        };

        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            model_path: detector_file
                .model_path
                .unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()),
            input_size: detector_file.input_size.unwrap_or(DEFAULT_MODEL_INPUT),
            confidence: detector_file.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            iou: detector_file.iou.unwrap_or(DEFAULT_IOU),
        };

        let smtp_file = file.smtp.unwrap_or_default();
        let smtp = SmtpSettings {
            host: smtp_file
                .host
                .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            port: smtp_file.port.unwrap_or(DEFAULT_SMTP_PORT),
            username: smtp_file.username,
            password: smtp_file.password,
            sender: smtp_file.sender,
            timeout: Duration::from_secs(
                smtp_file.timeout_secs.unwrap_or(DEFAULT_SMTP_TIMEOUT_SECS),
            ),
        };

        let recipients = match file.recipients {
            Some(list) => list
                .into_iter()
                .map(|r| Recipient::new(r.label, r.address))
                .collect(),
            None => default_recipients(),
        };

        let alert_file = file.alert.unwrap_or_default();
        let alert = AlertSettings {
            rearm_on_failure: alert_file.rearm_on_failure.unwrap_or(true),
            shutdown_grace: Duration::from_secs(
                alert_file
                    .shutdown_grace_secs
                    .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
            ),
        };

        Self {
            region: file.region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
            threshold: file.threshold.unwrap_or(DEFAULT_THRESHOLD),
            person_class_id: file.person_class_id.unwrap_or(PERSON_CLASS_ID),
            camera,
            detector,
            smtp,
            recipients,
            alert,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(region) = non_empty_env("STAMPEDE_REGION") {
            self.region = region;
        }
        if let Some(threshold) = non_empty_env("STAMPEDE_THRESHOLD") {
            self.threshold = threshold
                .parse()
                .map_err(|_| anyhow!("STAMPEDE_THRESHOLD must be a non-negative integer"))?;
        }
        if let Some(device) = non_empty_env("STAMPEDE_CAMERA") {
            self.camera.device = device;
        }
        if let Some(model) = non_empty_env("STAMPEDE_MODEL") {
            self.detector.model_path = model;
        }
        if let Some(host) = non_empty_env("STAMPEDE_SMTP_HOST") {
            self.smtp.host = host;
        }
        if let Some(port) = non_empty_env("STAMPEDE_SMTP_PORT") {
            self.smtp.port = port
                .parse()
                .map_err(|_| anyhow!("STAMPEDE_SMTP_PORT must be a port number"))?;
        }
        if let Some(username) = non_empty_env("STAMPEDE_SMTP_USERNAME") {
            self.smtp.username = Some(username);
        }
        if let Some(password) = non_empty_env("STAMPEDE_SMTP_PASSWORD") {
            self.smtp.password = Some(password);
        }
        if let Some(sender) = non_empty_env("STAMPEDE_SENDER") {
            self.smtp.sender = Some(sender);
        }
        if let Some(recipients) = non_empty_env("STAMPEDE_RECIPIENTS") {
            self.recipients = parse_recipients(&recipients)?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.region = self.region.trim().to_string();
        if self.region.is_empty() {
            return Err(anyhow!("region must not be empty"));
        }
        if self.recipients.len() != REQUIRED_RECIPIENTS {
            return Err(anyhow!(
                "exactly {} alert recipients are required, got {}",
                REQUIRED_RECIPIENTS,
                self.recipients.len()
            ));
        }
        for recipient in &self.recipients {
            crate::alert::validate_address(&recipient.address)?;
            if recipient.label.trim().is_empty() {
                return Err(anyhow!(
                    "recipient {} has an empty label",
                    recipient.address
                ));
            }
        }
        if let Some(sender) = &self.smtp.sender {
            crate::alert::validate_address(sender)?;
        }
        if self.smtp.port == 0 {
            return Err(anyhow!("smtp port must be greater than zero"));
        }
        if self.smtp.timeout.is_zero() {
            return Err(anyhow!("smtp timeout_secs must be greater than zero"));
        }
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector input size must be greater than zero"));
        }
        for (name, value) in [
            ("confidence", self.detector.confidence),
            ("iou", self.detector.iou),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("detector {} must be within 0..=1, got {}", name, value));
            }
        }
        Ok(())
    }
}

fn default_recipients() -> Vec<Recipient> {
    DEFAULT_RECIPIENTS
        .iter()
        .map(|(label, address)| Recipient::new(*label, *address))
        .collect()
}

fn read_config_file(path: &Path) -> Result<StampedeConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse `label=address` pairs separated by commas.
fn parse_recipients(value: &str) -> Result<Vec<Recipient>> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (label, address) = entry
                .split_once('=')
                .ok_or_else(|| anyhow!("recipient '{}' must be written label=address", entry))?;
            Ok(Recipient::new(label.trim(), address.trim()))
        })
        .collect()
}
