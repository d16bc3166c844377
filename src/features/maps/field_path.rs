//! `map-config.yml` 的字段路径读写
//!
//! 路径形如 `maps[0].ranges[1].radius`，先解析成段序列，
//! 再沿着静态的配置结构逐段匹配，不依赖运行时反射。

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_yaml::Value;

use crate::error::AppError;

use super::map_config::{MapConfig, MapDefaults, MapDefinition, MapOptions, MapRange};

/// 路径中的一段：字段名，可选下标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub field: String,
    pub index: Option<usize>,
}

/// 已解析的字段路径；空路径表示整个配置
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

#[derive(Debug, thiserror::Error)]
pub enum FieldPathError {
    #[error("路径语法错误 '{path}': {message}")]
    Syntax { path: String, message: String },

    #[error("未知字段 '{field}'（位于 {at}）")]
    UnknownField { at: String, field: String },

    #[error("{at} 下标越界: {index} >= {len}")]
    IndexOutOfRange { at: String, index: usize, len: usize },

    #[error("{at} 不是列表，不能使用下标")]
    NotIndexable { at: String },

    #[error("{at} 是列表，需要指定下标")]
    IndexRequired { at: String },

    #[error("{at} 需要 {expected} 类型的值，实际为 {got}")]
    TypeMismatch {
        at: String,
        expected: &'static str,
        got: String,
    },

    #[error("{at} 不是可直接赋值的字段")]
    NotAssignable { at: String },
}

impl From<FieldPathError> for AppError {
    fn from(err: FieldPathError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl FieldPath {
    pub fn parse(input: &str) -> Result<Self, FieldPathError> {
        let syntax = |message: &str| FieldPathError::Syntax {
            path: input.to_string(),
            message: message.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let mut segments = Vec::new();
        for part in trimmed.split('.') {
            let (field, index) = match part.find('[') {
                None => (part, None),
                Some(open) => {
                    let close = part
                        .strip_suffix(']')
                        .ok_or_else(|| syntax("缺少 ']'"))?;
                    let raw = &close[open + 1..];
                    let idx = raw
                        .parse::<usize>()
                        .map_err(|_| syntax("下标必须是非负整数"))?;
                    (&part[..open], Some(idx))
                }
            };
            if field.is_empty()
                || !field
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(syntax("字段名为空或包含非法字符"));
            }
            segments.push(Segment {
                field: field.to_string(),
                index,
            });
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromStr for FieldPath {
    type Err = FieldPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&seg.field)?;
            if let Some(idx) = seg.index {
                write!(f, "[{idx}]")?;
            }
        }
        Ok(())
    }
}

/// 命令行传入的标量值：依次尝试整数、布尔、空值，其余按字符串处理
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarValue {
    Int(i64),
    Bool(bool),
    Null,
    Text(String),
}

impl ScalarValue {
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim();
        if let Ok(n) = s.parse::<i64>() {
            return ScalarValue::Int(n);
        }
        match s {
            "true" => ScalarValue::Bool(true),
            "false" => ScalarValue::Bool(false),
            "null" | "~" => ScalarValue::Null,
            _ => ScalarValue::Text(raw.to_string()),
        }
    }

    fn describe(&self) -> String {
        match self {
            ScalarValue::Int(n) => format!("整数 {n}"),
            ScalarValue::Bool(b) => format!("布尔 {b}"),
            ScalarValue::Null => "null".to_string(),
            ScalarValue::Text(s) => format!("字符串 '{s}'"),
        }
    }

    fn text(&self) -> Option<String> {
        match self {
            ScalarValue::Int(n) => Some(n.to_string()),
            ScalarValue::Bool(b) => Some(b.to_string()),
            ScalarValue::Null => None,
            ScalarValue::Text(s) => Some(s.clone()),
        }
    }
}

/// 只读遍历时的节点
enum Node<'a> {
    Config(&'a MapConfig),
    Defaults(&'a MapDefaults),
    Maps(&'a [MapDefinition]),
    Map(&'a MapDefinition),
    Options(&'a MapOptions),
    Ranges(&'a [MapRange]),
    Range(&'a MapRange),
    Center(&'a [i32; 2]),
    Leaf(Value),
}

/// 读取字段，返回 YAML 值
pub fn get(config: &MapConfig, path: &FieldPath) -> Result<Value, FieldPathError> {
    let mut node = Node::Config(config);
    let mut at = String::from("<root>");

    for seg in &path.segments {
        node = field(node, &seg.field, &at)?;
        at = if at == "<root>" {
            seg.field.clone()
        } else {
            format!("{at}.{}", seg.field)
        };
        if let Some(idx) = seg.index {
            node = index(node, idx, &at)?;
            at = format!("{at}[{idx}]");
        }
    }

    match node {
        Node::Config(c) => to_value(c, &at),
        Node::Defaults(d) => to_value(d, &at),
        Node::Maps(m) => to_value(&m, &at),
        Node::Map(m) => to_value(m, &at),
        Node::Options(o) => to_value(o, &at),
        Node::Ranges(r) => to_value(&r, &at),
        Node::Range(r) => to_value(r, &at),
        Node::Center(c) => to_value(c, &at),
        Node::Leaf(v) => Ok(v),
    }
}

fn to_value<T: Serialize + ?Sized>(v: &T, at: &str) -> Result<Value, FieldPathError> {
    serde_yaml::to_value(v).map_err(|e| FieldPathError::TypeMismatch {
        at: at.to_string(),
        expected: "可序列化",
        got: e.to_string(),
    })
}

fn leaf<T: Serialize>(v: &T) -> Node<'static> {
    Node::Leaf(serde_yaml::to_value(v).unwrap_or(Value::Null))
}

fn field<'a>(node: Node<'a>, name: &str, at: &str) -> Result<Node<'a>, FieldPathError> {
    let unknown = || FieldPathError::UnknownField {
        at: at.to_string(),
        field: name.to_string(),
    };
    let next = match node {
        Node::Config(c) => match name {
            "defaults" => Node::Defaults(&c.defaults),
            "maps" => Node::Maps(&c.maps),
            _ => return Err(unknown()),
        },
        Node::Defaults(d) => match name {
            "zoomout" => leaf(&d.zoomout),
            "zoomin" => leaf(&d.zoomin),
            "imageformat" => leaf(&d.imageformat),
            "chunkprocessors" => leaf(&d.chunkprocessors),
            _ => return Err(unknown()),
        },
        Node::Map(m) => match name {
            "name" => leaf(&m.name),
            "dimension" => leaf(&m.dimension),
            "output_subdir" => leaf(&m.output_subdir),
            "zoomout" => leaf(&m.zoomout),
            "zoomin" => leaf(&m.zoomin),
            "options" => Node::Options(&m.options),
            "ranges" => Node::Ranges(&m.ranges),
            _ => return Err(unknown()),
        },
        Node::Options(o) => match name {
            "topY" => leaf(&o.top_y),
            "bottomY" => leaf(&o.bottom_y),
            "gndxray" => leaf(&o.gndxray),
            "shadows" => leaf(&o.shadows),
            "night" => leaf(&o.night),
            "players" => leaf(&o.players),
            _ => return Err(unknown()),
        },
        Node::Range(r) => match name {
            "name" => leaf(&r.name),
            "center" => Node::Center(&r.center),
            "radius" => leaf(&r.radius),
            "zoomout" => leaf(&r.zoomout),
            "zoomin" => leaf(&r.zoomin),
            _ => return Err(unknown()),
        },
        Node::Maps(_) | Node::Ranges(_) | Node::Center(_) | Node::Leaf(_) => {
            return Err(unknown());
        }
    };
    Ok(next)
}

fn index<'a>(node: Node<'a>, idx: usize, at: &str) -> Result<Node<'a>, FieldPathError> {
    let out_of_range = |len: usize| FieldPathError::IndexOutOfRange {
        at: at.to_string(),
        index: idx,
        len,
    };
    match node {
        Node::Maps(maps) => maps.get(idx).map(Node::Map).ok_or(out_of_range(maps.len())),
        Node::Ranges(ranges) => ranges
            .get(idx)
            .map(Node::Range)
            .ok_or(out_of_range(ranges.len())),
        Node::Center(center) => center
            .get(idx)
            .map(|v| leaf(v))
            .ok_or(out_of_range(center.len())),
        _ => Err(FieldPathError::NotIndexable { at: at.to_string() }),
    }
}

/// 可写遍历时的容器节点
enum NodeMut<'a> {
    Config(&'a mut MapConfig),
    Defaults(&'a mut MapDefaults),
    Map(&'a mut MapDefinition),
    Options(&'a mut MapOptions),
    Range(&'a mut MapRange),
}

/// 写入单个标量字段
pub fn set(
    config: &mut MapConfig,
    path: &FieldPath,
    value: ScalarValue,
) -> Result<(), FieldPathError> {
    let Some((last, parents)) = path.segments.split_last() else {
        return Err(FieldPathError::NotAssignable {
            at: "<root>".to_string(),
        });
    };

    let mut node = NodeMut::Config(config);
    let mut at = String::new();
    for seg in parents {
        at = join(&at, seg);
        node = container(node, seg, &at)?;
    }
    let at = join(&at, last);
    assign(node, last, value, &at)
}

fn join(prefix: &str, seg: &Segment) -> String {
    let mut s = if prefix.is_empty() {
        seg.field.clone()
    } else {
        format!("{prefix}.{}", seg.field)
    };
    if let Some(idx) = seg.index {
        s.push_str(&format!("[{idx}]"));
    }
    s
}

fn pick<'a, T>(
    items: &'a mut [T],
    idx: Option<usize>,
    at: &str,
) -> Result<&'a mut T, FieldPathError> {
    let idx = idx.ok_or_else(|| FieldPathError::IndexRequired { at: at.to_string() })?;
    let len = items.len();
    items.get_mut(idx).ok_or(FieldPathError::IndexOutOfRange {
        at: at.to_string(),
        index: idx,
        len,
    })
}

fn container<'a>(
    node: NodeMut<'a>,
    seg: &Segment,
    at: &str,
) -> Result<NodeMut<'a>, FieldPathError> {
    let name = seg.field.as_str();
    let no_index = |next: NodeMut<'a>| match seg.index {
        Some(_) => Err(FieldPathError::NotIndexable { at: at.to_string() }),
        None => Ok(next),
    };
    match (node, name) {
        (NodeMut::Config(c), "defaults") => no_index(NodeMut::Defaults(&mut c.defaults)),
        (NodeMut::Config(c), "maps") => Ok(NodeMut::Map(pick(&mut c.maps, seg.index, at)?)),
        (NodeMut::Map(m), "options") => no_index(NodeMut::Options(&mut m.options)),
        (NodeMut::Map(m), "ranges") => Ok(NodeMut::Range(pick(&mut m.ranges, seg.index, at)?)),
        _ => Err(FieldPathError::UnknownField {
            at: at.to_string(),
            field: name.to_string(),
        }),
    }
}

fn assign(
    node: NodeMut<'_>,
    seg: &Segment,
    value: ScalarValue,
    at: &str,
) -> Result<(), FieldPathError> {
    let mismatch = |expected: &'static str, value: &ScalarValue| FieldPathError::TypeMismatch {
        at: at.to_string(),
        expected,
        got: value.describe(),
    };
    let int = |value: &ScalarValue| match value {
        ScalarValue::Int(n) => i32::try_from(*n).map_err(|_| mismatch("i32 范围内的整数", value)),
        other => Err(mismatch("整数", other)),
    };
    let opt_int = |value: &ScalarValue| match value {
        ScalarValue::Null => Ok(None),
        other => int(other).map(Some),
    };
    let opt_bool = |value: &ScalarValue| match value {
        ScalarValue::Null => Ok(None),
        ScalarValue::Bool(b) => Ok(Some(*b)),
        other => Err(mismatch("布尔", other)),
    };
    let text = |value: &ScalarValue| value.text().ok_or_else(|| mismatch("字符串", value));

    let name = seg.field.as_str();
    if seg.index.is_some() && !matches!((&node, name), (NodeMut::Range(_), "center")) {
        return Err(FieldPathError::NotIndexable { at: at.to_string() });
    }

    match (node, name) {
        (NodeMut::Defaults(d), "zoomout") => d.zoomout = int(&value)?,
        (NodeMut::Defaults(d), "zoomin") => d.zoomin = int(&value)?,
        (NodeMut::Defaults(d), "imageformat") => d.imageformat = text(&value)?,
        (NodeMut::Defaults(d), "chunkprocessors") => d.chunkprocessors = int(&value)?,

        (NodeMut::Map(m), "name") => m.name = text(&value)?,
        (NodeMut::Map(m), "dimension") => {
            m.dimension = text(&value)?
                .parse()
                .map_err(|_| mismatch("overworld / nether / end", &value))?;
        }
        (NodeMut::Map(m), "output_subdir") => m.output_subdir = value.text(),
        (NodeMut::Map(m), "zoomout") => m.zoomout = opt_int(&value)?,
        (NodeMut::Map(m), "zoomin") => m.zoomin = opt_int(&value)?,

        (NodeMut::Options(o), "topY") => o.top_y = opt_int(&value)?,
        (NodeMut::Options(o), "bottomY") => o.bottom_y = opt_int(&value)?,
        (NodeMut::Options(o), "gndxray") => o.gndxray = opt_bool(&value)?,
        (NodeMut::Options(o), "night") => o.night = opt_bool(&value)?,
        (NodeMut::Options(o), "players") => o.players = opt_bool(&value)?,
        (NodeMut::Options(o), "shadows") => {
            o.shadows = match &value {
                ScalarValue::Null => None,
                ScalarValue::Bool(b) => Some((*b).into()),
                other => Some(
                    text(other)?
                        .parse()
                        .map_err(|_| mismatch("true / false / 2d / 3d / 3do", other))?,
                ),
            };
        }

        (NodeMut::Range(r), "name") => r.name = text(&value)?,
        (NodeMut::Range(r), "radius") => r.radius = int(&value)?,
        (NodeMut::Range(r), "zoomout") => r.zoomout = opt_int(&value)?,
        (NodeMut::Range(r), "zoomin") => r.zoomin = opt_int(&value)?,
        (NodeMut::Range(r), "center") => match seg.index {
            Some(idx @ 0..=1) => r.center[idx] = int(&value)?,
            Some(idx) => {
                return Err(FieldPathError::IndexOutOfRange {
                    at: at.to_string(),
                    index: idx,
                    len: 2,
                });
            }
            None => return Err(FieldPathError::IndexRequired { at: at.to_string() }),
        },

        (NodeMut::Config(_), "defaults" | "maps")
        | (NodeMut::Map(_), "options" | "ranges") => {
            return Err(FieldPathError::NotAssignable { at: at.to_string() });
        }
        _ => {
            return Err(FieldPathError::UnknownField {
                at: at.to_string(),
                field: name.to_string(),
            });
        }
    }
    Ok(())
}
