// Inline pages shaped like the site's markup

pub const ROOT_URL: &str = "https://news.example.com/";

/// Three listed articles: two complete, the third (a job posting) without
/// any subtext links.
pub fn front_page() -> String {
    r##"<html><body><center><table id="hnmain">
<tr><td><a href="news">Stacker News</a></td></tr>
<tr><td><table>
<tr class="athing" id="1"><td class="title"><span class="rank">1.</span></td><td class="title"><span class="titleline"><a href="https://example.com/alpha">Alpha released</a></span></td></tr>
<tr><td colspan="2"></td><td class="subtext"><span class="score">120 points</span> by <a href="user?id=alice">alice</a> <span class="age"><a href="item?id=1">2 hours ago</a></span> | <a href="item?id=1">45&nbsp;comments</a></td></tr>
<tr class="spacer" style="height:5px"></tr>
<tr class="athing" id="2"><td class="title"><span class="rank">2.</span></td><td class="title"><span class="titleline"><a href="https://example.com/beta">Beta notes</a></span></td></tr>
<tr><td colspan="2"></td><td class="subtext"><span class="score">7 points</span> by <a href="user?id=bob">bob</a> <span class="age"><a href="item?id=2">1 hour ago</a></span> | <a href="item?id=2">discuss</a></td></tr>
<tr class="spacer" style="height:5px"></tr>
<tr class="athing" id="3"><td class="title"><span class="rank">3.</span></td><td class="title"><span class="titleline"><a href="https://example.com/jobs">Hiring</a></span></td></tr>
<tr><td colspan="2"></td><td class="subtext">3 hours ago</td></tr>
<tr class="spacer" style="height:5px"></tr>
<tr><td colspan="2"></td><td class="title"><a href="news?p=2" class="morelink">More</a></td></tr>
</table></td></tr>
</table></center></body></html>"##
        .to_string()
}

/// One comment row the way an item page nests it.
pub fn comment(id: i64, user: &str, offset: i32, text: &str) -> String {
    format!(
        r##"<tr class="athing comtr" id="{id}"><td><table><tr>
<td class="ind"><img src="s.gif" height="1" width="{offset}"></td>
<td class="default"><div><span class="comhead"><a href="user?id={user}">{user}</a> <a href="item?id={id}">1 hour ago</a></span></div><br>
<span class="comment"><font color="#000000">{text}</font><div class="reply"><p><font size="1"><u><a href="reply?id={id}">reply</a></u></font></p></div></span></td>
</tr></table></td></tr>"##
    )
}

/// A comment row whose head carries an extra link.
pub fn malformed_comment(id: i64, user: &str, offset: i32, text: &str) -> String {
    format!(
        r##"<tr class="athing comtr" id="{id}"><td><table><tr>
<td class="ind"><img src="s.gif" height="1" width="{offset}"></td>
<td class="default"><div><span class="comhead"><a href="user?id={user}">{user}</a> <a href="item?id={id}">1 hour ago</a> <a href="flag?id={id}">flag</a></span></div><br>
<span class="comment"><font color="#5a5a5a">{text}</font></span></td>
</tr></table></td></tr>"##
    )
}

pub fn comment_page(comments: &[String]) -> String {
    format!(
        r##"<html><body><center><table id="hnmain"><tr><td><table class="comment-tree">{}</table></td></tr></table></center></body></html>"##,
        comments.concat()
    )
}
