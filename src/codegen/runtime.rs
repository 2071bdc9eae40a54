//! Runtime helper library prepended to generated scripts.
//!
//! Every helper is POSIX sh and runs unchanged under bash. The generator marks
//! helpers as it references them; only the dependency closure of the marked set
//! is emitted, in catalog order.

use std::collections::BTreeSet;

/// Catalog of runtime helpers. Declaration order is emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Helper {
    Null,
    Eol,
    Tmpfile,
    Quote,
    Cmd,
    Spawn,
    Await,
    FieldGet,
    FieldSet,
    SafeField,
    Dispatch,
    Coalesce,
    ArrayNew,
    ArrayGet,
    ArraySet,
    ArrayLen,
    ArrayJoin,
    MapKey,
    MapNew,
    MapGet,
    MapSet,
    FloatMath,
    FloatCmp,
    FloatToInt,
    StrCmp,
    StrLen,
    StrUpper,
    StrLower,
    StrTrim,
    StrContains,
    StrStartsWith,
    StrEndsWith,
    StrReplace,
    StrSplit,
    CharAt,
}

impl Helper {
    pub const ALL: &'static [Helper] = &[
        Helper::Null,
        Helper::Eol,
        Helper::Tmpfile,
        Helper::Quote,
        Helper::Cmd,
        Helper::Spawn,
        Helper::Await,
        Helper::FieldGet,
        Helper::FieldSet,
        Helper::SafeField,
        Helper::Dispatch,
        Helper::Coalesce,
        Helper::ArrayNew,
        Helper::ArrayGet,
        Helper::ArraySet,
        Helper::ArrayLen,
        Helper::ArrayJoin,
        Helper::MapKey,
        Helper::MapNew,
        Helper::MapGet,
        Helper::MapSet,
        Helper::FloatMath,
        Helper::FloatCmp,
        Helper::FloatToInt,
        Helper::StrCmp,
        Helper::StrLen,
        Helper::StrUpper,
        Helper::StrLower,
        Helper::StrTrim,
        Helper::StrContains,
        Helper::StrStartsWith,
        Helper::StrEndsWith,
        Helper::StrReplace,
        Helper::StrSplit,
        Helper::CharAt,
    ];

    /// Shell name the generated program calls (or reads, for `Null`).
    pub fn name(self) -> &'static str {
        match self {
            Helper::Null => "__RT_NULL",
            Helper::Eol => "__RT_NL",
            Helper::Tmpfile => "__rt_tmpfile",
            Helper::Quote => "__rt_quote",
            Helper::Cmd => "__rt_cmd",
            Helper::Spawn => "__rt_spawn",
            Helper::Await => "__rt_await",
            Helper::FieldGet => "__rt_field_get",
            Helper::FieldSet => "__rt_field_set",
            Helper::SafeField => "__rt_safe_field",
            Helper::Dispatch => "__rt_dispatch",
            Helper::Coalesce => "__rt_coalesce",
            Helper::ArrayNew => "__rt_array",
            Helper::ArrayGet => "__rt_array_get",
            Helper::ArraySet => "__rt_array_set",
            Helper::ArrayLen => "__rt_array_len",
            Helper::ArrayJoin => "__rt_array_join",
            Helper::MapKey => "__rt_map_key",
            Helper::MapNew => "__rt_map_new",
            Helper::MapGet => "__rt_map_get",
            Helper::MapSet => "__rt_map_set",
            Helper::FloatMath => "__rt_fmath",
            Helper::FloatCmp => "__rt_fcmp",
            Helper::FloatToInt => "__rt_ftoi",
            Helper::StrCmp => "__rt_strcmp",
            Helper::StrLen => "__rt_str_len",
            Helper::StrUpper => "__rt_str_upper",
            Helper::StrLower => "__rt_str_lower",
            Helper::StrTrim => "__rt_str_trim",
            Helper::StrContains => "__rt_str_contains",
            Helper::StrStartsWith => "__rt_str_starts_with",
            Helper::StrEndsWith => "__rt_str_ends_with",
            Helper::StrReplace => "__rt_str_replace",
            Helper::StrSplit => "__rt_str_split",
            Helper::CharAt => "__rt_char_at",
        }
    }

    pub fn deps(self) -> &'static [Helper] {
        match self {
            Helper::Cmd => &[Helper::Quote],
            Helper::Spawn => &[Helper::Tmpfile],
            Helper::SafeField => &[Helper::Null, Helper::FieldGet],
            Helper::Coalesce => &[Helper::Null],
            Helper::MapGet => &[Helper::MapKey, Helper::Null],
            Helper::MapSet => &[Helper::MapKey],
            _ => &[],
        }
    }

    fn source(self) -> &'static str {
        match self {
            Helper::Null => "__RT_NULL=\"$(printf '\\036')\"\n",
            Helper::Eol => r##"__RT_NL="$(printf '\nx')"
__RT_NL="${__RT_NL%x}"
__RT_CR="$(printf '\r')"
"##,
            Helper::Tmpfile => r##"__rt_tmpfiles=""
__rt_tmpfile() {
  __rt_tmp="$(mktemp)" || exit 1
  __rt_tmpfiles="$__rt_tmpfiles $__rt_tmp"
}
__rt_cleanup() {
  for __rt_f in $__rt_tmpfiles; do rm -f "$__rt_f" "$__rt_f.done"; done
}
trap __rt_cleanup EXIT
"##,
            Helper::Quote => r##"__rt_quote() {
  printf "'%s'" "$(printf '%s' "$1" | sed "s/'/'\\\\''/g")"
}
"##,
            Helper::Cmd => r##"__rt_cmd() {
  __rt_ret=""
  for __rt_a in "$@"; do
    __rt_ret="$__rt_ret${__rt_ret:+ }$(__rt_quote "$__rt_a")"
  done
}
"##,
            Helper::Spawn => r##"__rt_spawn() {
  __rt_tmpfile
  { eval "$1" >"$__rt_tmp"; : >"$__rt_tmp.done"; } &
  __rt_ret="$!:$__rt_tmp"
}
"##,
            Helper::Await => r##"__rt_await() {
  __rt_path="${1#*:}"
  if [ ! -f "$__rt_path" ]; then
    printf '%s\n' "process handle already awaited" >&2
    exit 1
  fi
  wait "${1%%:*}" 2>/dev/null
  while [ ! -f "$__rt_path.done" ]; do sleep 1; done
  __rt_ret="$(cat "$__rt_path")"
  rm -f "$__rt_path" "$__rt_path.done"
}
"##,
            Helper::FieldGet => r##"__rt_field_get() { eval "printf '%s' \"\${${1}_${2}}\""; }
"##,
            Helper::FieldSet => r##"__rt_field_set() { eval "${1}_${2}=\$3"; }
"##,
            Helper::SafeField => r##"__rt_safe_field() {
  if [ "$1" = "$__RT_NULL" ]; then printf '%s' "$__RT_NULL"; else __rt_field_get "$1" "$2"; fi
}
"##,
            Helper::Dispatch => r##"__rt_dispatch() {
  eval "__rt_dt=\${${1}__type}"
  __rt_dr="$1"
  __rt_dm="$2"
  shift 2
  "${__rt_dt}__${__rt_dm}" "$__rt_dr" "$@"
}
"##,
            Helper::Coalesce => r##"__rt_coalesce() {
  if [ "$1" = "$__RT_NULL" ]; then printf '%s' "$2"; else printf '%s' "$1"; fi
}
"##,
            Helper::ArrayNew => r##"__rt_array() {
  if [ "$#" -gt 0 ]; then printf '%s\037' "$@"; fi
}
"##,
            Helper::ArrayGet => r##"__rt_array_get() {
  printf '%s' "$1" | awk -v i="$2" 'BEGIN { RS = "\037" } NR == i + 1 { printf "%s", $0 }'
}
"##,
            Helper::ArraySet => r##"__rt_array_set() {
  printf '%s' "$1" | __rt_av="$3" awk -v i="$2" 'BEGIN { RS = ORS = "\037" } NR == i + 1 { print ENVIRON["__rt_av"]; next } { print }'
}
"##,
            Helper::ArrayLen => r##"__rt_array_len() {
  printf '%s' "$1" | awk 'BEGIN { RS = "\037" } END { printf "%d", NR }'
}
"##,
            Helper::ArrayJoin => r##"__rt_array_join() {
  printf '%s' "$1" | __rt_sep="$2" awk 'BEGIN { RS = "\037" } NR > 1 { printf "%s", ENVIRON["__rt_sep"] } { printf "%s", $0 }'
}
"##,
            Helper::MapKey => r##"__rt_map_key() {
  printf '%s' "$1" | od -An -tx1 | tr -d ' \n'
}
"##,
            Helper::MapNew => r##"__rt_map_seq=0
__rt_map_new() {
  __rt_map_seq=$((__rt_map_seq + 1))
  __rt_ret="__rt_map$__rt_map_seq"
}
"##,
            Helper::MapGet => r##"__rt_map_get() {
  __rt_mv="${1}_k$(__rt_map_key "$2")"
  eval "if [ \"\${$__rt_mv+set}\" = set ]; then printf '%s' \"\$$__rt_mv\"; else printf '%s' \"\$__RT_NULL\"; fi"
}
"##,
            Helper::MapSet => r##"__rt_map_set() {
  eval "${1}_k$(__rt_map_key "$2")=\$3"
}
"##,
            Helper::FloatMath => r##"__rt_fmath() {
  awk -v a="$1" -v op="$2" -v b="$3" 'BEGIN {
    if (op == "+") r = a + b
    else if (op == "-") r = a - b
    else if (op == "*") r = a * b
    else if (op == "/") r = a / b
    else r = a % b
    printf "%.15g", r
  }'
}
"##,
            Helper::FloatCmp => r##"__rt_fcmp() {
  awk -v a="$1" -v op="$2" -v b="$3" 'BEGIN {
    if (op == "<") r = a < b
    else if (op == "<=") r = a <= b
    else if (op == ">") r = a > b
    else if (op == ">=") r = a >= b
    else if (op == "==") r = a == b
    else r = a != b
    exit !r
  }'
}
"##,
            Helper::FloatToInt => r##"__rt_ftoi() { awk -v a="$1" 'BEGIN { printf "%d", a }'; }
"##,
            Helper::StrCmp => r##"__rt_strcmp() {
  __rt_sa="$1" __rt_sb="$3" awk -v op="$2" 'BEGIN {
    a = ENVIRON["__rt_sa"] ""
    b = ENVIRON["__rt_sb"] ""
    if (op == "<") r = a < b
    else if (op == "<=") r = a <= b
    else if (op == ">") r = a > b
    else r = a >= b
    exit !r
  }'
}
"##,
            Helper::StrLen => r##"__rt_str_len() { __rt_s="$1" awk 'BEGIN { printf "%d", length(ENVIRON["__rt_s"]) }'; }
"##,
            Helper::StrUpper => r##"__rt_str_upper() { printf '%s' "$1" | tr '[:lower:]' '[:upper:]'; }
"##,
            Helper::StrLower => r##"__rt_str_lower() { printf '%s' "$1" | tr '[:upper:]' '[:lower:]'; }
"##,
            Helper::StrTrim => r##"__rt_str_trim() {
  __rt_s="$1" awk 'BEGIN { s = ENVIRON["__rt_s"]; sub(/^[[:space:]]+/, "", s); sub(/[[:space:]]+$/, "", s); printf "%s", s }'
}
"##,
            Helper::StrContains => r##"__rt_str_contains() {
  case "$1" in *"$2"*) printf true ;; *) printf false ;; esac
}
"##,
            Helper::StrStartsWith => r##"__rt_str_starts_with() {
  case "$1" in "$2"*) printf true ;; *) printf false ;; esac
}
"##,
            Helper::StrEndsWith => r##"__rt_str_ends_with() {
  case "$1" in *"$2") printf true ;; *) printf false ;; esac
}
"##,
            Helper::StrReplace => r##"__rt_str_replace() {
  __rt_s="$1" __rt_old="$2" __rt_new="$3" awk 'BEGIN {
    s = ENVIRON["__rt_s"]; old = ENVIRON["__rt_old"]; new = ENVIRON["__rt_new"]
    if (old == "") { printf "%s", s; exit }
    n = length(old)
    while ((i = index(s, old)) > 0) { printf "%s%s", substr(s, 1, i - 1), new; s = substr(s, i + n) }
    printf "%s", s
  }'
}
"##,
            Helper::StrSplit => r##"__rt_str_split() {
  __rt_s="$1" __rt_sep="$2" awk 'BEGIN {
    s = ENVIRON["__rt_s"]; sep = ENVIRON["__rt_sep"]
    if (sep == "") { printf "%s\037", s; exit }
    n = length(sep)
    while ((i = index(s, sep)) > 0) { printf "%s\037", substr(s, 1, i - 1); s = substr(s, i + n) }
    printf "%s\037", s
  }'
}
"##,
            Helper::CharAt => r##"__rt_char_at() {
  __rt_s="$1" awk -v i="$2" 'BEGIN { printf "%s", substr(ENVIRON["__rt_s"], i + 1, 1) }'
}
"##,
        }
    }
}

/// Helpers referenced by the program being generated.
#[derive(Debug, Default, Clone)]
pub struct HelperUsage {
    used: BTreeSet<Helper>,
}

impl HelperUsage {
    pub fn mark(&mut self, helper: Helper) {
        self.used.insert(helper);
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    /// Marked helpers plus everything they call, in catalog order.
    pub fn closure(&self) -> Vec<Helper> {
        let mut all = BTreeSet::new();
        let mut stack: Vec<Helper> = self.used.iter().copied().collect();
        while let Some(h) = stack.pop() {
            if all.insert(h) {
                stack.extend(h.deps().iter().copied());
            }
        }
        all.into_iter().collect()
    }
}

pub fn emit_helpers(usage: &HelperUsage) -> String {
    usage.closure().into_iter().map(Helper::source).collect()
}
