//! Default configuration values

/// First published game port; project `i` of a batch gets `BASE_GAME_PORT + i`
pub const BASE_GAME_PORT: u16 = 25565;

/// First published debug port; project `i` of a batch gets `BASE_DEBUG_PORT + i`
pub const BASE_DEBUG_PORT: u16 = 5005;

/// Port the game server listens on inside its container
pub const CONTAINER_GAME_PORT: u16 = 25565;

/// Port the JVM debugger listens on inside its container
pub const CONTAINER_DEBUG_PORT: u16 = 5005;

/// First published port for resource (database) services
pub const RESOURCE_BASE_PORT: u16 = 27100;

/// Number of ports resource services are hashed into
pub const RESOURCE_PORT_RANGE: u16 = 900;

/// Downloads at or below this size are treated as error pages, not binaries
pub const MIN_ARTIFACT_SIZE: u64 = 100_000;

/// Time budget for the external project build (in seconds)
pub const COMPILE_TIMEOUT_SECS: u64 = 300;

/// Time budget for a single HTTP request (in seconds)
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Game version tag used to filter registry builds
pub const COMPAT_TAG: &str = "1.21";

/// Server version baked into every image
pub const RUNTIME_VERSION: &str = "1.21.8";

/// Base image every project image is built from
pub const BASE_IMAGE: &str = "itzg/minecraft-server:latest";

/// Prefix for generated image names
pub const IMAGE_PREFIX: &str = "local-minecraft";

/// File name of the runtime bridge inside the plugins directory
pub const BRIDGE_FILE_NAME: &str = "local-engine.jar";

/// Project manifest location relative to a project directory
pub const PROJECT_MANIFEST: &str = "config/game-properties.yaml";

/// Resource manifest directory relative to a project directory
pub const RESOURCE_MANIFEST_DIR: &str = "config/databases";

/// Topology file name inside the workspace
pub const TOPOLOGY_FILE: &str = "docker-compose.yml";

/// Project-path registry file name inside the workspace
pub const PROJECT_PATHS_FILE: &str = ".project-paths.json";

/// Workspace configuration file name
pub const WORKSPACE_CONFIG_FILE: &str = "gamestack.toml";

/// Shared network every managed service joins
pub const DEFAULT_NETWORK: &str = "local-docker-network";

/// Default stack name for deployment
pub const DEFAULT_STACK_NAME: &str = "local-docker";

/// Forwarding secret written into the proxy trust fragment
pub const DEFAULT_FORWARDING_SECRET: &str = "local-forwarding-secret";

/// Value used for declared secrets with no supplied value
pub const UNSET_SECRET: &str = "unset";

/// Topology file format version
pub const COMPOSE_VERSION: &str = "3.8";

/// Log line the server prints once it accepts connections
pub const READY_LOG_MARKER: &str = "Done (";

/// Infrastructure services that are round-tripped untouched
pub const PRESERVED_SERVICES: &[&str] = &["mongodb", "kafka", "kafka-ui", "zookeeper", "velocity"];

/// Environment baked into every game-server image and service
pub const RUNTIME_ENV: &[(&str, &str)] = &[
    ("EULA", "TRUE"),
    ("TYPE", "PAPER"),
    ("VERSION", RUNTIME_VERSION),
    ("MEMORY", "2G"),
    ("DEBUG", "true"),
    ("DEBUG_PORT", "5005"),
    ("ENABLE_RCON", "true"),
    ("RCON_PORT", "25575"),
    ("GENERATE_STRUCTURES", "false"),
    ("ALLOW_NETHER", "false"),
    ("ALLOW_FLIGHT", "true"),
    ("SPAWN_PROTECTION", "0"),
    ("LEVEL_TYPE", "FLAT"),
    ("LEVEL_TYPE_FLAT_GENERATOR_SETTINGS", "{}"),
];

/// Seconds a console command may take before it is abandoned
pub const CONSOLE_TIMEOUT_SECS: u64 = 10;

/// File the server reads queued console commands from
pub const CONSOLE_COMMAND_FILE: &str = "/data/command.txt";

/// Restart attempts before the engine gives up on a service
pub const RESTART_MAX_ATTEMPTS: u32 = 3;

/// Delay between restart attempts
pub const RESTART_DELAY: &str = "5s";
