pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# CWSOURCE CONFIGURATION
# =============================================================================
# cwsource polls CloudWatch Logs and republishes every event as a JSON record,
# checkpointing progress after delivery so a restart never skips events. Events
# sharing the last committed millisecond may be delivered again.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/cwsource/config.yml
#   3. /etc/cwsource/config.yml
#
# Values may reference environment variables with $env{NAME}.

# =============================================================================
# SOURCES
# =============================================================================
# Each source is polled by its own independent task with its own checkpoint.
#
# partition: 'stream' keeps one checkpoint per log stream and needs either a
#            fixed log_stream or follow_latest: true.
#            'group' keeps one checkpoint for the whole log group and starts
#            'lookback' in the past when no checkpoint exists yet.
#
# topic:     Output topic. When omitted it is derived from the log group by
#            dropping one leading '/' and turning the remaining '/' into '.'
#            (/app/service -> app.service).

sources:
  api_access:
    region: $env{AWS_REGION}
    log_group: /app/api
    partition: stream
    log_stream: access
    # Pages fetched per poll cycle; a large backlog drains over several cycles
    max_pages: 1

  worker:
    region: $env{AWS_REGION}
    log_group: /app/worker
    partition: stream
    # Always read the stream with the most recent event
    follow_latest: true

  audit:
    region: $env{AWS_REGION}
    log_group: /platform/audit
    partition: group
    lookback: 24h
    topic: platform.audit
    page_limit: 1000

# =============================================================================
# POLLING
# =============================================================================
poll:
  # Pause between poll cycles
  interval: 1s
  # Initial wait after a failed cycle, doubled up to max_backoff
  retry_backoff: 1s
  max_backoff: 60s

# =============================================================================
# CHECKPOINTS
# =============================================================================
checkpoint:
  path: ~/.local/state/cwsource/checkpoints.json

# =============================================================================
# OUTPUT
# =============================================================================
# Records are written as JSON lines. Omit 'path' to write to stdout.
output:
  path: ~/.local/state/cwsource/records.jsonl
"#
    .to_string()
}
