use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.embedding.provider, Provider::OpenAi);
    assert_eq!(config.embedding.base_url, "https://api.openai.com");
    assert_eq!(config.embedding.model, "text-embedding-ada-002");
    assert_eq!(config.embedding.dimension, 1536);
    assert_eq!(config.generation.model, "gpt-3.5-turbo");
    assert_eq!(config.generation.max_output_tokens, 500);
    assert!((config.generation.temperature - 0.1).abs() < f32::EPSILON);
    assert_eq!(config.chunking.max_chunk_size, 800);
    assert_eq!(config.chunking.chunk_overlap, 100);
    assert_eq!(config.retrieval.top_k, 3);
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.embedding.base_url = "ftp://example.com".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidScheme(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.embedding.model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.batch_size = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.generation.temperature = 2.5;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.generation.timeout_seconds = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.top_k = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTopK(0))
    ));

    let mut invalid_config = config;
    invalid_config.generation.api_key_env = "  ".to_string();
    assert!(invalid_config.validate().is_err());
}

#[test]
fn overlap_must_be_smaller_than_window() {
    let mut config = Config::default();
    config.chunking.chunk_overlap = config.chunking.max_chunk_size;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlapTooLarge(800, 800))
    ));

    config.chunking.chunk_overlap = 799;
    assert!(config.validate().is_ok());
}

#[test]
fn endpoint_generation() {
    let config = Config::default();
    assert_eq!(
        config
            .embedding
            .endpoint()
            .expect("embedding endpoint")
            .as_str(),
        "https://api.openai.com/v1/embeddings"
    );
    assert_eq!(
        config
            .generation
            .endpoint()
            .expect("generation endpoint")
            .as_str(),
        "https://api.openai.com/v1/chat/completions"
    );

    let mut ollama = EmbeddingConfig::default();
    ollama.set_provider(Provider::Ollama);
    assert_eq!(ollama.base_url, "http://localhost:11434");
    assert_eq!(
        ollama.endpoint().expect("ollama endpoint").as_str(),
        "http://localhost:11434/api/embed"
    );
    assert_eq!(
        ollama.probe_url().expect("ollama probe").as_str(),
        "http://localhost:11434/api/tags"
    );
}

#[test]
fn endpoint_keeps_base_path_prefix() {
    let mut config = GenerationConfig::default();
    config
        .set_base_url("https://gateway.example.com/openai".to_string())
        .expect("valid url");

    assert_eq!(
        config.endpoint().expect("endpoint").as_str(),
        "https://gateway.example.com/openai/v1/chat/completions"
    );
}

#[test]
fn provider_switch_keeps_custom_base_url() {
    let mut config = EmbeddingConfig::default();
    config
        .set_base_url("https://proxy.internal".to_string())
        .expect("valid url");
    config.set_provider(Provider::Ollama);
    assert_eq!(config.base_url, "https://proxy.internal");
}

#[test]
fn setter_validation() {
    let mut embedding = EmbeddingConfig::default();
    assert!(embedding.set_model("nomic-embed-text".to_string()).is_ok());
    assert!(embedding.set_batch_size(16).is_ok());
    assert!(embedding.set_dimension(768).is_ok());
    assert!(embedding.set_base_url("http://127.0.0.1:8080".to_string()).is_ok());

    assert!(embedding.set_model("   ".to_string()).is_err());
    assert!(embedding.set_batch_size(0).is_err());
    assert!(embedding.set_batch_size(4096).is_err());
    assert!(embedding.set_dimension(0).is_err());
    assert!(embedding.set_base_url("not a url".to_string()).is_err());

    let mut generation = GenerationConfig::default();
    assert!(generation.set_max_output_tokens(1000).is_ok());
    assert!(generation.set_temperature(0.0).is_ok());
    assert!(generation.set_max_output_tokens(0).is_err());
    assert!(generation.set_temperature(-0.1).is_err());
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
    assert!(toml_str.contains("provider = \"openai\""));
}

#[test]
fn partial_toml_uses_defaults() {
    let partial = r#"
        [embedding]
        provider = "ollama"
        base_url = "http://localhost:11434"
        model = "nomic-embed-text"
        dimension = 768

        [retrieval]
        top_k = 5
    "#;

    let config: Config = toml::from_str(partial).expect("should parse partial toml");
    assert_eq!(config.embedding.provider, Provider::Ollama);
    assert_eq!(config.embedding.dimension, 768);
    assert_eq!(config.embedding.batch_size, 256);
    assert_eq!(config.generation, GenerationConfig::default());
    assert_eq!(config.retrieval.top_k, 5);
}

#[test]
fn load_missing_config_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("missing file falls back to defaults");
    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert_eq!(config.embedding, EmbeddingConfig::default());
}

#[test]
fn save_and_reload() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().join("nested"),
        ..Config::default()
    };
    config.retrieval.top_k = 7;
    config.chunking.chunk_overlap = 50;

    config.save().expect("should save config");
    assert!(config.config_file_path().exists());

    let loaded = Config::load(temp_dir.path().join("nested")).expect("should reload config");
    assert_eq!(loaded, config);
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[chunking]\nmax_chunk_size = 100\nchunk_overlap = 100\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn error_display_messages() {
    let errors = vec![
        ConfigError::InvalidScheme("ftp".to_string()),
        ConfigError::InvalidBatchSize(0),
        ConfigError::InvalidModel(String::new()),
        ConfigError::InvalidUrl("invalid-url".to_string()),
        ConfigError::OverlapTooLarge(10, 5),
    ];

    for error in errors {
        let message = format!("{error}");
        assert!(message.len() > 10);
    }
}
