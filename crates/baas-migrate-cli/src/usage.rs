//! Usage text shared by `migrate` and `migrate-help`.

pub const GUIDE: &str = "\
Copies an application from one backend project (source) to another (target).

Modes:
  full (default)   probe both projects, export the schema, copy every table
                   and, with --include-storage, every storage bucket
  --schema-only    write schema.sql only; needs the source project only
  --data-only      copy table data only; needs both projects

Credentials:
  --source-url, --source-key      source project URL and public key (always required)
  --target-url, --target-key      target project URL and public key (data and full runs)
  --source-service-key,
  --target-service-key            privileged keys, required with --include-storage

Output (in --output-dir, default ./migration-output):
  schema.sql       DDL to run on the target project before importing data
  data.json        every exported row, keyed by table
  sql/<table>.sql  per-table INSERT scripts, with --emit-sql

Each file is written as soon as the phase producing it finishes, so a run that
fails later (for example during storage) still leaves them behind. schema.sql
can be applied more than once.

The schema is never applied automatically. Run schema.sql against the target
(for example in its SQL editor) before a data migration, or the import will
fail for missing tables.

Exit codes:
  0 success, 1 invalid configuration, 2 connectivity failure,
  3 remote API error, 4 transfer error, 5 storage error, 6 JSON error,
  7 file error, 130 cancelled
";

pub const EXAMPLES: &str = "\
Examples:
  migrate --source-url=https://old.example.co --source-key=$OLD_ANON --schema-only

  migrate --source-url=https://old.example.co --source-key=$OLD_ANON \\
          --target-url=https://new.example.co --target-key=$NEW_ANON \\
          --batch-size=200 --output-dir=./backup

  migrate --source-url=https://old.example.co --source-key=$OLD_ANON \\
          --source-service-key=$OLD_SERVICE \\
          --target-url=https://new.example.co --target-key=$NEW_ANON \\
          --target-service-key=$NEW_SERVICE --include-storage
";
