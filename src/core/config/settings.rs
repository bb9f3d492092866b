use super::parsing::{
    env_optional, env_or_default, normalize_base_url, parse_bool, parse_environment,
    parse_temperature, parse_u16, parse_u32, parse_u64, parse_usize,
};
use super::types::{
    ArchiveSettings, ConfigError, DatabaseSettings, ExtractionSettings, GenerationSettings,
    RuntimeSettings, S3Settings, Settings, TelemetrySettings,
};

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let environment =
            parse_environment(env_optional("QUIZZO_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("QUIZZO_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "quizzo");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "quizzo_db");
        let database_url = env_optional("DATABASE_URL");

        let api_key = env_or_default("GEMINI_API_KEY", "");
        let base_url =
            normalize_base_url(env_or_default("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL));
        let model = env_or_default("GEMINI_MODEL", "gemini-2.0-flash");
        let temperature =
            parse_temperature("GENERATION_TEMPERATURE", env_or_default("GENERATION_TEMPERATURE", "0.7"))?;
        let max_output_tokens = parse_u32(
            "GENERATION_MAX_OUTPUT_TOKENS",
            env_or_default("GENERATION_MAX_OUTPUT_TOKENS", "8127"),
        )?;
        let request_timeout_seconds = parse_u64(
            "GENERATION_TIMEOUT_SECONDS",
            env_or_default("GENERATION_TIMEOUT_SECONDS", "120"),
        )?;
        let send_raw_file =
            env_optional("GENERATION_SEND_RAW_FILE").map(|value| parse_bool(&value)).unwrap_or(false);

        let max_pdf_pages =
            parse_usize("EXTRACT_MAX_PDF_PAGES", env_or_default("EXTRACT_MAX_PDF_PAGES", "10"))?;
        let max_text_bytes =
            parse_usize("EXTRACT_MAX_TEXT_BYTES", env_or_default("EXTRACT_MAX_TEXT_BYTES", "50000"))?;
        let max_upload_size_mb =
            parse_u64("MAX_UPLOAD_SIZE_MB", env_or_default("MAX_UPLOAD_SIZE_MB", "10"))?;

        let file_storage_url = env_optional("FILE_STORAGE_URL").map(normalize_base_url);
        let archive_timeout_seconds = parse_u64(
            "FILE_STORAGE_TIMEOUT_SECONDS",
            env_or_default("FILE_STORAGE_TIMEOUT_SECONDS", "15"),
        )?;

        let s3_endpoint = env_or_default("S3_ENDPOINT", "https://storage.yandexcloud.net");
        let s3_access_key = env_or_default("S3_ACCESS_KEY", "");
        let s3_secret_key = env_or_default("S3_SECRET_KEY", "");
        let s3_bucket = env_or_default("S3_BUCKET", "quizzo-sources");
        let s3_region = env_or_default("S3_REGION", "ru-central1");
        let s3_prefix = env_or_default("S3_PREFIX", "quiz-sources");

        let log_level = env_or_default("QUIZZO_LOG_LEVEL", "info");
        let json = env_optional("QUIZZO_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            runtime: RuntimeSettings { environment, strict_config },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            generation: GenerationSettings {
                api_key,
                base_url,
                model,
                temperature,
                max_output_tokens,
                request_timeout_seconds,
                send_raw_file,
            },
            extraction: ExtractionSettings { max_pdf_pages, max_text_bytes, max_upload_size_mb },
            archive: ArchiveSettings { file_storage_url, timeout_seconds: archive_timeout_seconds },
            s3: S3Settings {
                endpoint: s3_endpoint,
                access_key: s3_access_key,
                secret_key: s3_secret_key,
                bucket: s3_bucket,
                region: s3_region,
                prefix: s3_prefix,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn generation(&self) -> &GenerationSettings {
        &self.generation
    }

    pub(crate) fn extraction(&self) -> &ExtractionSettings {
        &self.extraction
    }

    pub(crate) fn archive(&self) -> &ArchiveSettings {
        &self.archive
    }

    pub(crate) fn s3(&self) -> &S3Settings {
        &self.s3
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "GENERATION_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.generation.max_output_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "GENERATION_MAX_OUTPUT_TOKENS",
                value: "0".to_string(),
            });
        }

        if let Some(url) = &self.archive.file_storage_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue { field: "FILE_STORAGE_URL", value: url.clone() });
            }
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.generation.api_key.is_empty() {
            return Err(ConfigError::MissingSecret("GEMINI_API_KEY"));
        }
        if self.archive.file_storage_url.is_none() && !self.s3.is_configured() {
            return Err(ConfigError::MissingSecret("FILE_STORAGE_URL or S3_ACCESS_KEY/S3_SECRET_KEY"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Settings;
    use crate::core::config::ConfigError;
    use crate::test_support;

    #[tokio::test]
    async fn defaults_load_in_test_environment() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();

        let settings = Settings::load().expect("settings");
        assert_eq!(settings.extraction().max_pdf_pages, 10);
        assert_eq!(settings.extraction().max_text_bytes, 50_000);
        assert_eq!(settings.generation().max_output_tokens, 8127);
        assert_eq!(settings.generation().model, "gemini-2.0-flash");
        assert!(!settings.generation().send_raw_file);
    }

    #[tokio::test]
    async fn strict_mode_requires_generation_key() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("QUIZZO_STRICT_CONFIG", "1");
        std::env::remove_var("GEMINI_API_KEY");

        let result = Settings::load();
        std::env::set_var("QUIZZO_STRICT_CONFIG", "0");

        assert!(matches!(result, Err(ConfigError::MissingSecret("GEMINI_API_KEY"))));
    }

    #[tokio::test]
    async fn rejects_non_http_file_storage_url() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("FILE_STORAGE_URL", "ftp://files.local");

        let result = Settings::load();
        std::env::remove_var("FILE_STORAGE_URL");

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field: "FILE_STORAGE_URL", .. })
        ));
    }
}
